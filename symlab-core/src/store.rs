//! JSON persistence and the dated output layout.
//!
//! One collection run writes everything under two dated directories:
//! raw backtest responses as `BACKTEST-<end>/<id>.json`, and the three CSV
//! datasets as `SYMPHONIES-<end>/<DATASET>.csv`.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("file not found: {0} (has the prior pipeline step run?)")]
    Missing(PathBuf),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{path} is not valid JSON: {source}")]
    InvalidJson {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Write a JSON document, creating parent directories as needed.
pub fn write_json(path: &Path, doc: &Value) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| StoreError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    }
    let rendered = serde_json::to_string_pretty(doc).expect("Value serialization is infallible");
    fs::write(path, rendered).map_err(|source| StoreError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), "wrote JSON document");
    Ok(())
}

/// Read and parse a JSON document.
///
/// A missing file is a distinct, blocking error: it means the step that
/// should have produced it has not run.
pub fn read_json(path: &Path) -> Result<Value, StoreError> {
    if !path.exists() {
        return Err(StoreError::Missing(path.to_path_buf()));
    }
    let raw = fs::read_to_string(path).map_err(|source| StoreError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| StoreError::InvalidJson {
        path: path.to_path_buf(),
        source,
    })
}

/// The three logical CSV datasets a run produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dataset {
    Symphonies,
    Oos,
    Backtest,
}

impl Dataset {
    pub fn name(&self) -> &'static str {
        match self {
            Dataset::Symphonies => "SYMPHONIES",
            Dataset::Oos => "OOS",
            Dataset::Backtest => "BACKTEST",
        }
    }
}

/// Filesystem layout for one run, keyed by the run's end date.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    base_dir: PathBuf,
    end_date: NaiveDate,
}

impl OutputLayout {
    pub fn new(base_dir: impl Into<PathBuf>, end_date: NaiveDate) -> Self {
        Self {
            base_dir: base_dir.into(),
            end_date,
        }
    }

    pub fn end_date(&self) -> NaiveDate {
        self.end_date
    }

    /// Path for one persisted raw backtest response.
    pub fn backtest_json_path(&self, id: &str) -> PathBuf {
        self.base_dir
            .join(format!("BACKTEST-{}", self.end_date))
            .join(format!("{id}.json"))
    }

    /// Path for one of the run's CSV datasets.
    pub fn csv_path(&self, dataset: Dataset) -> PathBuf {
        self.base_dir
            .join(format!("SYMPHONIES-{}", self.end_date))
            .join(format!("{}.csv", dataset.name()))
    }

    /// All backtest JSON files persisted for this run, in sorted order.
    pub fn persisted_backtests(&self) -> Result<Vec<PathBuf>, StoreError> {
        let dir = self.base_dir.join(format!("BACKTEST-{}", self.end_date));
        if !dir.exists() {
            return Err(StoreError::Missing(dir));
        }
        let entries = fs::read_dir(&dir).map_err(|source| StoreError::Read {
            path: dir.clone(),
            source,
        })?;
        let mut paths: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect();
        paths.sort();
        Ok(paths)
    }
}

/// Default collection window: 2000-01-01 through today.
pub fn default_date_range() -> (NaiveDate, NaiveDate) {
    let start = NaiveDate::from_ymd_opt(2000, 1, 1).expect("valid date");
    let end = chrono::Local::now().date_naive();
    (start, end)
}
