//! Pipeline stages above the core types: batch fetching, processing,
//! metrics, aggregation, and the run orchestrator.

pub mod aggregate;
pub mod config;
pub mod fetch;
pub mod metrics;
pub mod process;
pub mod runner;

pub use aggregate::{merge_metric_maps, merge_stats_by_id, stats_csv, symphonies_csv, MetricMap};
pub use config::{CollectConfig, ConfigError};
pub use fetch::{
    batch_fetch_backtests, batch_fetch_symphonies, BatchOutcome, FetchFailure, FixedDelay, Pacer,
    PACE_INTERVAL,
};
pub use metrics::{
    oos_metrics_by_id, oos_start_dates, quant_metrics_by_id, PerformanceMetrics,
    DEFAULT_OOS_START,
};
pub use process::{process_backtest_files, ProcessedBacktests};
pub use runner::{aggregate_from_disk, run_collection, CollectionSummary};
