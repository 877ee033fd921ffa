//! Pipeline orchestration: extract, fetch, process, aggregate.
//!
//! The pipeline is deliberately sequential. Each stage feeds the next, and
//! the two fetch stages must stay single-file to keep the fixed pacing
//! meaningful against the platform's rate limit.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::Context;
use chrono::NaiveDate;
use tracing::info;

use symlab_core::api::SymphonyApi;
use symlab_core::extract::extract_symphonies;
use symlab_core::store::{Dataset, OutputLayout};

use crate::aggregate::{merge_stats_by_id, stats_csv, symphonies_csv, write_csv, MetricMap};
use crate::config::CollectConfig;
use crate::fetch::{batch_fetch_backtests, batch_fetch_symphonies, FetchFailure, Pacer};
use crate::metrics::{
    oos_metrics_by_id, oos_start_dates, quant_metrics_by_id, DEFAULT_OOS_START,
};
use crate::process::process_backtest_files;

/// What one full collection run produced.
#[derive(Debug)]
pub struct CollectionSummary {
    pub discovered: usize,
    pub symphony_failures: Vec<FetchFailure>,
    pub backtest_failures: Vec<FetchFailure>,
    pub processed: usize,
    pub csv_paths: Vec<PathBuf>,
}

/// Run the full pipeline: discover symphonies from local exports, fetch
/// metadata and backtests, persist raw responses, then compute and write the
/// three CSV datasets.
///
/// Individual fetch failures are recorded in the summary, never fatal. A
/// missing export directory or an output write failure aborts the run.
pub fn run_collection(
    config: &CollectConfig,
    api: &dyn SymphonyApi,
    pacer: &mut dyn Pacer,
) -> anyhow::Result<CollectionSummary> {
    let layout = config.layout();
    let (start, end) = config.date_range();
    info!(start = %start, end = %end, "starting collection run");

    let records = extract_symphonies(&config.export_dir)
        .context("discovering symphonies from export files")?;
    let ids: Vec<String> = records.keys().cloned().collect();

    let symphonies_path = layout.csv_path(Dataset::Symphonies);
    write_csv(&symphonies_path, &symphonies_csv(&records)?)
        .context("writing symphony catalog CSV")?;

    let symphony_outcome = batch_fetch_symphonies(api, &ids, pacer);
    let oos_starts = oos_start_dates(&symphony_outcome.successes);

    let backtest_outcome =
        batch_fetch_backtests(api, &ids, &config.backtest_params(), &layout, pacer)
            .context("persisting backtest responses")?;

    let (processed, mut csv_paths) =
        aggregate_persisted(&layout, &oos_starts).context("aggregating persisted backtests")?;
    csv_paths.insert(0, symphonies_path);

    Ok(CollectionSummary {
        discovered: records.len(),
        symphony_failures: symphony_outcome.failures,
        backtest_failures: backtest_outcome.failures,
        processed,
        csv_paths,
    })
}

/// Recompute the two stats CSVs from responses already on disk, without any
/// network traffic.
///
/// Symphony metadata is not persisted, so per-symphony edit dates are
/// unavailable here; every out-of-sample window opens at the fallback date.
pub fn aggregate_from_disk(config: &CollectConfig) -> anyhow::Result<Vec<PathBuf>> {
    let layout = config.layout();
    let paths = layout
        .persisted_backtests()
        .context("listing persisted backtests")?;
    let processed = process_backtest_files(&paths);

    let oos_starts: HashMap<String, NaiveDate> = processed
        .names
        .keys()
        .map(|id| (id.clone(), DEFAULT_OOS_START))
        .collect();

    let (_, csv_paths) = aggregate_tables(&layout, processed, &oos_starts)?;
    Ok(csv_paths)
}

fn aggregate_persisted(
    layout: &OutputLayout,
    oos_starts: &HashMap<String, NaiveDate>,
) -> anyhow::Result<(usize, Vec<PathBuf>)> {
    let paths = layout
        .persisted_backtests()
        .context("listing persisted backtests")?;
    let processed = process_backtest_files(&paths);
    aggregate_tables(layout, processed, oos_starts)
}

fn aggregate_tables(
    layout: &OutputLayout,
    processed: crate::process::ProcessedBacktests,
    oos_starts: &HashMap<String, NaiveDate>,
) -> anyhow::Result<(usize, Vec<PathBuf>)> {
    let count = processed.len();

    let quant: HashMap<String, MetricMap> = quant_metrics_by_id(&processed.returns)
        .into_iter()
        .map(|(id, m)| (id, m.to_value_map()))
        .collect();
    let combined = merge_stats_by_id(&processed.stats, &quant);

    let backtest_path = layout.csv_path(Dataset::Backtest);
    write_csv(&backtest_path, &stats_csv(&processed.names, &combined)?)
        .context("writing backtest stats CSV")?;

    let oos: HashMap<String, MetricMap> = oos_metrics_by_id(&processed.returns, oos_starts)
        .into_iter()
        .map(|(id, m)| (id, m.to_value_map()))
        .collect();

    let oos_path = layout.csv_path(Dataset::Oos);
    write_csv(&oos_path, &stats_csv(&processed.names, &oos)?)
        .context("writing out-of-sample stats CSV")?;

    info!(
        symphonies = count,
        backtest_csv = %backtest_path.display(),
        oos_csv = %oos_path.display(),
        "aggregation complete"
    );
    Ok((count, vec![backtest_path, oos_path]))
}
