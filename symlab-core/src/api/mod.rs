//! Composer API surface: the `SymphonyApi` trait and shared request/response types.
//!
//! The trait abstracts over the real HTTP client so batch code can be
//! exercised against a mock. Non-success HTTP statuses are data, not errors:
//! the batch layer records them per identifier and keeps going. `ApiError`
//! is reserved for transport-level failures where no response arrived at all.

mod composer;

pub use composer::ComposerClient;

use chrono::NaiveDate;
use serde_json::Value;
use thiserror::Error;

/// Transport-level failures of a single API call.
///
/// No retry policy lives here or anywhere above: every call is one attempt,
/// and the batch layer turns these into failure records.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("network unreachable: {0}")]
    Network(String),

    #[error("invalid symphony URL or id: {0}")]
    InvalidId(String),
}

/// Raw outcome of one API call.
///
/// `ok` is not purely status-derived: an empty body or undecodable JSON
/// yields `ok = false` even on a 2xx status, matching what downstream
/// consumers can actually use.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub ok: bool,
    pub status: u16,
    pub body: Value,
}

/// Uniform backtest request parameters, applied to every identifier in a batch.
#[derive(Debug, Clone)]
pub struct BacktestParams {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub capital: f64,
    pub slippage_percent: f64,
}

impl BacktestParams {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            start_date,
            end_date,
            capital: 100_000.0,
            slippage_percent: 0.0005,
        }
    }
}

/// Read-only Composer endpoints used by the pipeline.
pub trait SymphonyApi {
    /// Fetch the metadata document for one symphony.
    fn fetch_symphony(&self, id: &str) -> Result<ApiResponse, ApiError>;

    /// Fetch a backtest document for one symphony over a date range.
    fn fetch_backtest(&self, id: &str, params: &BacktestParams) -> Result<ApiResponse, ApiError>;
}

/// Extract a symphony id from a Composer URL, or pass a bare id through.
///
/// Handles both `.../symphony/{id}` and `.../symphony/{id}/details`.
pub fn symphony_id_from_url(url: &str) -> Result<String, ApiError> {
    // The query string and fragment are not part of the path.
    let path = url
        .trim()
        .split(['?', '#'])
        .next()
        .unwrap_or("")
        .trim_end_matches('/');
    if path.is_empty() {
        return Err(ApiError::InvalidId(url.to_string()));
    }
    if !path.contains('/') {
        return Ok(path.to_string());
    }

    let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();

    match parts.as_slice() {
        [] => Err(ApiError::InvalidId(url.to_string())),
        [.., id, "details"] => Ok((*id).to_string()),
        [.., id] => Ok((*id).to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_id_passes_through() {
        assert_eq!(symphony_id_from_url("AbC123xyz").unwrap(), "AbC123xyz");
        assert_eq!(symphony_id_from_url("  AbC123xyz ").unwrap(), "AbC123xyz");
    }

    #[test]
    fn plain_symphony_url() {
        let url = "https://app.composer.trade/symphony/AbC123xyz";
        assert_eq!(symphony_id_from_url(url).unwrap(), "AbC123xyz");
    }

    #[test]
    fn details_url_takes_second_to_last_segment() {
        let url = "https://app.composer.trade/symphony/AbC123xyz/details";
        assert_eq!(symphony_id_from_url(url).unwrap(), "AbC123xyz");
    }

    #[test]
    fn trailing_slash_is_tolerated() {
        let url = "https://app.composer.trade/symphony/AbC123xyz/";
        assert_eq!(symphony_id_from_url(url).unwrap(), "AbC123xyz");
    }

    #[test]
    fn query_string_and_fragment_are_stripped() {
        let url = "https://app.composer.trade/symphony/AbC123xyz?utm_source=discord";
        assert_eq!(symphony_id_from_url(url).unwrap(), "AbC123xyz");

        let url = "https://app.composer.trade/symphony/AbC123xyz/details?chart=oos";
        assert_eq!(symphony_id_from_url(url).unwrap(), "AbC123xyz");

        let url = "https://app.composer.trade/symphony/AbC123xyz#holdings";
        assert_eq!(symphony_id_from_url(url).unwrap(), "AbC123xyz");
    }

    #[test]
    fn empty_url_is_invalid() {
        assert!(symphony_id_from_url("").is_err());
        assert!(symphony_id_from_url("   ").is_err());
        assert!(symphony_id_from_url("?utm_source=discord").is_err());
    }
}
