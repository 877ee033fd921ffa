//! Blocking HTTP client for the public Composer backtest API.
//!
//! One attempt per call, 30 second timeout, no retry ladder. Rate limiting
//! is handled above this layer by the batch fetcher's fixed pacing.

use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

use super::{symphony_id_from_url, ApiError, ApiResponse, BacktestParams, SymphonyApi};

const BASE_URL: &str = "https://backtest-api.composer.trade/api";

/// Client for `backtest-api.composer.trade` — public endpoints, no authentication.
pub struct ComposerClient {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl ComposerClient {
    pub fn new() -> Self {
        Self::with_base_url(BASE_URL)
    }

    /// Point the client at an alternate base URL (used by tests).
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Classify a response the way downstream code needs it: an empty body is
    /// unusable regardless of status, and a body that is not JSON is reported
    /// as a 500 with an empty document.
    fn classify(resp: reqwest::blocking::Response) -> ApiResponse {
        let status = resp.status().as_u16();
        let success = resp.status().is_success();

        let bytes = match resp.bytes() {
            Ok(b) => b,
            Err(e) => return ApiResponse {
                ok: false,
                status,
                body: json!({ "error": e.to_string() }),
            },
        };

        if bytes.is_empty() {
            return ApiResponse {
                ok: false,
                status,
                body: json!({}),
            };
        }

        match serde_json::from_slice::<Value>(&bytes) {
            Ok(body) => ApiResponse {
                ok: success,
                status,
                body,
            },
            Err(e) => {
                debug!(status, error = %e, "response body is not valid JSON");
                ApiResponse {
                    ok: false,
                    status: 500,
                    body: json!({}),
                }
            }
        }
    }
}

impl Default for ComposerClient {
    fn default() -> Self {
        Self::new()
    }
}

impl SymphonyApi for ComposerClient {
    fn fetch_symphony(&self, id: &str) -> Result<ApiResponse, ApiError> {
        let symphony_id = symphony_id_from_url(id)?;
        let url = format!("{}/v1/public/symphonies/{}", self.base_url, symphony_id);
        debug!(%symphony_id, "fetching symphony");

        let resp = self
            .client
            .get(&url)
            .send()
            .map_err(|e| ApiError::Network(e.to_string()))?;
        Ok(Self::classify(resp))
    }

    fn fetch_backtest(&self, id: &str, params: &BacktestParams) -> Result<ApiResponse, ApiError> {
        let symphony_id = symphony_id_from_url(id)?;
        let url = format!(
            "{}/v2/public/symphonies/{}/backtest",
            self.base_url, symphony_id
        );

        let payload = json!({
            "capital": params.capital,
            "apply_reg_fee": true,
            "apply_taf_fee": true,
            "backtest_version": "v2",
            "slippage_percent": params.slippage_percent,
            "start_date": params.start_date.format("%Y-%m-%d").to_string(),
            "end_date": params.end_date.format("%Y-%m-%d").to_string(),
        });
        debug!(%symphony_id, start = %params.start_date, end = %params.end_date, "fetching backtest");

        let resp = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .map_err(|e| ApiError::Network(e.to_string()))?;
        Ok(Self::classify(resp))
    }
}
