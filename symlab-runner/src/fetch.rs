//! Batch fetching with fixed pacing and failure bookkeeping.
//!
//! Both fetchers walk an ordered identifier list, one call per identifier,
//! pausing before every 20th call (0-indexed) to respect the platform's rate
//! limit. There are no retries: a non-success response becomes a
//! `FetchFailure` and the loop keeps going. Callers re-drive failures by
//! re-invoking with the recorded identifiers.

use std::time::Duration;

use serde_json::Value;
use tracing::{info, warn};

use symlab_core::api::{BacktestParams, SymphonyApi};
use symlab_core::store::{write_json, OutputLayout, StoreError};

/// A pause fires before the call at every position divisible by this.
pub const PACE_INTERVAL: usize = 20;

/// Seam for the rate-limit pause so tests can count firings instead of sleeping.
pub trait Pacer {
    fn pause(&mut self);
}

/// Production pacer: a fixed-duration sleep.
pub struct FixedDelay {
    delay: Duration,
}

impl FixedDelay {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    /// The default pacing used against the live API.
    pub fn one_second() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl Pacer for FixedDelay {
    fn pause(&mut self) {
        std::thread::sleep(self.delay);
    }
}

/// One fetch attempt that did not succeed.
///
/// `status` is the HTTP status code; 0 records a call that produced no HTTP
/// response at all (transport failure).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    pub index: usize,
    pub id: String,
    pub status: u16,
}

/// Result of one batch pass: raw response bodies plus failure records.
///
/// `successes.len() + failures.len()` always equals the input length.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub successes: Vec<Value>,
    pub failures: Vec<FetchFailure>,
}

/// Fetch the metadata document for each symphony in order.
///
/// Network I/O only — nothing is persisted.
pub fn batch_fetch_symphonies(
    api: &dyn SymphonyApi,
    ids: &[String],
    pacer: &mut dyn Pacer,
) -> BatchOutcome {
    let mut outcome = BatchOutcome::default();

    for (index, id) in ids.iter().enumerate() {
        if index % PACE_INTERVAL == 0 {
            pacer.pause();
        }

        match api.fetch_symphony(id) {
            Ok(resp) if resp.ok => outcome.successes.push(resp.body),
            Ok(resp) => {
                warn!(%id, index, status = resp.status, "symphony fetch failed");
                outcome.failures.push(FetchFailure {
                    index,
                    id: id.clone(),
                    status: resp.status,
                });
            }
            Err(e) => {
                warn!(%id, index, error = %e, "symphony fetch produced no response");
                outcome.failures.push(FetchFailure {
                    index,
                    id: id.clone(),
                    status: 0,
                });
            }
        }
    }

    info!(
        total = ids.len(),
        succeeded = outcome.successes.len(),
        failed = outcome.failures.len(),
        "symphony batch complete"
    );
    outcome
}

/// Fetch a backtest for each symphony over a uniform date range, persisting
/// every raw response — success or failure payload — to the layout's dated
/// directory before classifying it. Failed fetches still leave an artifact
/// for later inspection.
///
/// A filesystem write error aborts the batch; persistence is the point of
/// this pass.
pub fn batch_fetch_backtests(
    api: &dyn SymphonyApi,
    ids: &[String],
    params: &BacktestParams,
    layout: &OutputLayout,
    pacer: &mut dyn Pacer,
) -> Result<BatchOutcome, StoreError> {
    let mut outcome = BatchOutcome::default();

    for (index, id) in ids.iter().enumerate() {
        if index % PACE_INTERVAL == 0 {
            pacer.pause();
        }

        match api.fetch_backtest(id, params) {
            Ok(resp) => {
                write_json(&layout.backtest_json_path(id), &resp.body)?;
                if resp.ok {
                    outcome.successes.push(resp.body);
                } else {
                    warn!(%id, index, status = resp.status, "backtest fetch failed");
                    outcome.failures.push(FetchFailure {
                        index,
                        id: id.clone(),
                        status: resp.status,
                    });
                }
            }
            Err(e) => {
                warn!(%id, index, error = %e, "backtest fetch produced no response");
                outcome.failures.push(FetchFailure {
                    index,
                    id: id.clone(),
                    status: 0,
                });
            }
        }
    }

    info!(
        total = ids.len(),
        succeeded = outcome.successes.len(),
        failed = outcome.failures.len(),
        "backtest batch complete"
    );
    Ok(outcome)
}
