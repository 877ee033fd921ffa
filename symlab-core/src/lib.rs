//! Symlab core — domain types and I/O for collecting Composer symphony data.
//!
//! This crate provides the building blocks the runner composes into a
//! pipeline:
//! - Composer API client behind the [`api::SymphonyApi`] trait
//! - Discord export extraction into symphony records
//! - Backtest document parsing (allocations, return series, raw stats)
//! - Dated output layout and JSON persistence

pub mod api;
pub mod backtest;
pub mod extract;
pub mod store;

pub use api::{ApiError, ApiResponse, BacktestParams, ComposerClient, SymphonyApi};
pub use backtest::{AllocationTable, BacktestDocument, BacktestParseError, ReturnSeries};
pub use extract::{extract_symphonies, ExtractError, SymphonyRecord};
pub use store::{default_date_range, read_json, write_json, Dataset, OutputLayout, StoreError};
