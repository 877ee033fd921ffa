//! Serializable collection run configuration.
//!
//! Loaded from TOML. Only the two directories are required; everything else
//! has a sensible default matching the live collection setup.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use symlab_core::api::BacktestParams;
use symlab_core::store::{default_date_range, OutputLayout};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Configuration for one collection run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectConfig {
    /// Directory of archived chat export JSON files to discover symphonies from.
    pub export_dir: PathBuf,

    /// Base directory for the run's dated output directories.
    pub output_dir: PathBuf,

    /// Backtest start date (inclusive). Defaults to 2000-01-01.
    #[serde(default)]
    pub start_date: Option<NaiveDate>,

    /// Backtest end date (inclusive). Defaults to today; also keys the
    /// output directory names.
    #[serde(default)]
    pub end_date: Option<NaiveDate>,

    /// Starting capital for every backtest request.
    #[serde(default = "default_capital")]
    pub capital: f64,

    /// Slippage fraction for every backtest request.
    #[serde(default = "default_slippage")]
    pub slippage_percent: f64,
}

fn default_capital() -> f64 {
    100_000.0
}

fn default_slippage() -> f64 {
    0.0005
}

impl CollectConfig {
    /// Load a configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse a configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// The effective date window, with defaults filled in.
    pub fn date_range(&self) -> (NaiveDate, NaiveDate) {
        let (default_start, default_end) = default_date_range();
        (
            self.start_date.unwrap_or(default_start),
            self.end_date.unwrap_or(default_end),
        )
    }

    /// Backtest request parameters for this run.
    pub fn backtest_params(&self) -> BacktestParams {
        let (start, end) = self.date_range();
        let mut params = BacktestParams::new(start, end);
        params.capital = self.capital;
        params.slippage_percent = self.slippage_percent;
        params
    }

    /// Output layout for this run, keyed by the effective end date.
    pub fn layout(&self) -> OutputLayout {
        let (_, end) = self.date_range();
        OutputLayout::new(&self.output_dir, end)
    }
}
