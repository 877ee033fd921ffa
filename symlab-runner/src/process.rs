//! Turn persisted backtest JSON files into in-memory tables.
//!
//! Processing is lenient per file: a file that cannot be read, parsed, or
//! interpreted is logged and skipped, so one bad artifact never poisons the
//! rest of a run. Callers that need a hard error on a missing directory get
//! it earlier, from `OutputLayout::persisted_backtests`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use symlab_core::backtest::{parse_backtest_document, AllocationTable, ReturnSeries};
use symlab_core::store::read_json;

use crate::aggregate::MetricMap;

/// Per-symphony tables extracted from one run's persisted backtests.
#[derive(Debug, Default)]
pub struct ProcessedBacktests {
    pub allocations: HashMap<String, AllocationTable>,
    pub returns: HashMap<String, ReturnSeries>,
    pub stats: HashMap<String, MetricMap>,
    pub names: HashMap<String, String>,
}

impl ProcessedBacktests {
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Process every persisted backtest file into per-symphony tables.
///
/// Failed fetches leave error payloads on disk alongside real documents;
/// those fail to parse here and are skipped like any other malformed file.
pub fn process_backtest_files(paths: &[PathBuf]) -> ProcessedBacktests {
    let mut processed = ProcessedBacktests::default();
    let mut skipped = 0usize;

    for path in paths {
        if let Err(e) = process_one(path, &mut processed) {
            warn!(file = %path.display(), error = %e, "skipping unprocessable backtest file");
            skipped += 1;
        }
    }

    info!(
        processed = processed.len(),
        skipped,
        "backtest processing complete"
    );
    processed
}

fn process_one(path: &Path, out: &mut ProcessedBacktests) -> anyhow::Result<()> {
    let doc = read_json(path)?;
    let parsed = parse_backtest_document(&doc)?;

    out.names.insert(parsed.id.clone(), parsed.name);
    out.allocations.insert(parsed.id.clone(), parsed.allocations);
    out.returns.insert(parsed.id.clone(), parsed.returns);
    out.stats
        .insert(parsed.id, parsed.stats.into_iter().collect());
    Ok(())
}
