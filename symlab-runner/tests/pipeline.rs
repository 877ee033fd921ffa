//! End-to-end pipeline test: export files in, CSV datasets out, with a mock
//! API standing in for the platform.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde_json::{json, Value};

use symlab_core::api::{ApiError, ApiResponse, BacktestParams, SymphonyApi};
use symlab_runner::{run_collection, aggregate_from_disk, CollectConfig, Pacer};

struct CountingPacer {
    pauses: usize,
}

impl Pacer for CountingPacer {
    fn pause(&mut self) {
        self.pauses += 1;
    }
}

/// Serves canned symphony metadata and backtest documents; fails the
/// configured ids with the given status.
struct CannedApi {
    fail_backtests: HashMap<String, u16>,
}

impl CannedApi {
    fn ok(body: Value) -> Result<ApiResponse, ApiError> {
        Ok(ApiResponse {
            ok: true,
            status: 200,
            body,
        })
    }
}

impl SymphonyApi for CannedApi {
    fn fetch_symphony(&self, id: &str) -> Result<ApiResponse, ApiError> {
        Self::ok(json!({
            "id": id,
            "last_semantic_update_at": "2024-01-03T00:00:00Z",
        }))
    }

    fn fetch_backtest(&self, id: &str, _params: &BacktestParams) -> Result<ApiResponse, ApiError> {
        if let Some(&status) = self.fail_backtests.get(id) {
            return Ok(ApiResponse {
                ok: false,
                status,
                body: json!({ "error": "backtest unavailable" }),
            });
        }
        // 19723 = 2024-01-01; capital doubles over four trading days.
        Self::ok(json!({
            "legend": { id: { "name": format!("Strategy {id}") } },
            "first_day": 19723,
            "last_market_day": 19727,
            "last_market_days_holdings": { "SPY": 10.0 },
            "tdvm_weights": { "SPY": { "19724": 1.0 } },
            "dvm_capital": {
                id: {
                    "19724": 100000.0,
                    "19725": 110000.0,
                    "19726": 105000.0,
                    "19727": 200000.0
                }
            },
            "stats": { "benchmark": "SPY", "platform_sharpe": 1.23 }
        }))
    }
}

fn write_export(dir: &Path, name: &str, ids: &[&str]) {
    let messages: Vec<Value> = ids
        .iter()
        .map(|id| {
            json!({
                "author": { "name": "alice" },
                "embeds": [{
                    "url": format!("https://app.composer.trade/symphony/{id}"),
                    "title": format!("Symphony {id}"),
                    "timestamp": "2024-01-01T00:00:00Z",
                }]
            })
        })
        .collect();
    fs::write(
        dir.join(name),
        serde_json::to_string(&json!({ "messages": messages })).unwrap(),
    )
    .unwrap();
}

fn test_config(export_dir: &Path, output_dir: &Path) -> CollectConfig {
    CollectConfig::from_toml(&format!(
        r#"
        export_dir = "{}"
        output_dir = "{}"
        start_date = "2020-01-01"
        end_date = "2024-06-01"
        "#,
        export_dir.display(),
        output_dir.display(),
    ))
    .unwrap()
}

#[test]
fn full_run_produces_all_three_datasets() {
    let exports = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_export(exports.path(), "channel.json", &["alpha", "beta", "gamma"]);

    let api = CannedApi {
        fail_backtests: HashMap::new(),
    };
    let mut pacer = CountingPacer { pauses: 0 };
    let config = test_config(exports.path(), output.path());

    let summary = run_collection(&config, &api, &mut pacer).unwrap();

    assert_eq!(summary.discovered, 3);
    assert!(summary.symphony_failures.is_empty());
    assert!(summary.backtest_failures.is_empty());
    assert_eq!(summary.processed, 3);
    // One pause per batch of 20, for each of the two fetch passes.
    assert_eq!(pacer.pauses, 2);

    let base = output.path().join("SYMPHONIES-2024-06-01");
    let catalog = fs::read_to_string(base.join("SYMPHONIES.csv")).unwrap();
    assert!(catalog.starts_with("symphony_sid,title,url,timestamp,name"));
    assert_eq!(catalog.lines().count(), 4);

    // Raw responses persisted under the dated backtest directory.
    for id in ["alpha", "beta", "gamma"] {
        assert!(output
            .path()
            .join("BACKTEST-2024-06-01")
            .join(format!("{id}.json"))
            .exists());
    }

    let stats = fs::read_to_string(base.join("BACKTEST.csv")).unwrap();
    let header = stats.lines().next().unwrap();
    // Platform stats and computed metrics share one row per symphony.
    assert!(header.starts_with("sid,name,"));
    assert!(header.contains("benchmark"));
    assert!(header.contains("sharpe"));
    assert!(header.contains("platform_sharpe"));
    assert_eq!(stats.lines().count(), 4);
    assert!(stats.contains("alpha,Strategy alpha,"));

    let oos = fs::read_to_string(base.join("OOS.csv")).unwrap();
    assert_eq!(oos.lines().count(), 4);
}

#[test]
fn failed_backtests_are_recorded_and_skipped() {
    let exports = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_export(exports.path(), "channel.json", &["alpha", "beta", "gamma"]);

    let api = CannedApi {
        fail_backtests: HashMap::from([("beta".to_string(), 503)]),
    };
    let mut pacer = CountingPacer { pauses: 0 };
    let config = test_config(exports.path(), output.path());

    let summary = run_collection(&config, &api, &mut pacer).unwrap();

    assert_eq!(summary.backtest_failures.len(), 1);
    assert_eq!(summary.backtest_failures[0].id, "beta");
    assert_eq!(summary.backtest_failures[0].status, 503);
    // The error payload is persisted but cannot be processed.
    assert_eq!(summary.processed, 2);

    let stats = fs::read_to_string(
        output
            .path()
            .join("SYMPHONIES-2024-06-01")
            .join("BACKTEST.csv"),
    )
    .unwrap();
    assert!(stats.contains("alpha"));
    assert!(!stats.contains("beta,"));
}

#[test]
fn missing_export_dir_is_fatal() {
    let output = tempfile::tempdir().unwrap();
    let config = test_config(Path::new("/nonexistent/exports"), output.path());

    let api = CannedApi {
        fail_backtests: HashMap::new(),
    };
    let mut pacer = CountingPacer { pauses: 0 };
    assert!(run_collection(&config, &api, &mut pacer).is_err());
}

#[test]
fn aggregate_from_disk_recomputes_without_network() {
    let exports = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_export(exports.path(), "channel.json", &["alpha"]);

    let api = CannedApi {
        fail_backtests: HashMap::new(),
    };
    let mut pacer = CountingPacer { pauses: 0 };
    let config = test_config(exports.path(), output.path());
    run_collection(&config, &api, &mut pacer).unwrap();

    let base = output.path().join("SYMPHONIES-2024-06-01");
    fs::remove_file(base.join("BACKTEST.csv")).unwrap();
    fs::remove_file(base.join("OOS.csv")).unwrap();

    let paths = aggregate_from_disk(&config).unwrap();
    assert_eq!(paths.len(), 2);
    assert!(base.join("BACKTEST.csv").exists());
    assert!(base.join("OOS.csv").exists());
}

#[test]
fn aggregate_from_disk_requires_prior_run() {
    let exports = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let config = test_config(exports.path(), output.path());
    assert!(aggregate_from_disk(&config).is_err());
}

#[test]
fn oos_window_excludes_history_before_the_edit_date() {
    let exports = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_export(exports.path(), "channel.json", &["alpha"]);

    let api = CannedApi {
        fail_backtests: HashMap::new(),
    };
    let mut pacer = CountingPacer { pauses: 0 };
    let config = test_config(exports.path(), output.path());
    run_collection(&config, &api, &mut pacer).unwrap();

    let base = output.path().join("SYMPHONIES-2024-06-01");
    let full = fs::read_to_string(base.join("BACKTEST.csv")).unwrap();
    let oos = fs::read_to_string(base.join("OOS.csv")).unwrap();

    let column = |csv: &str, name: &str| -> f64 {
        let mut lines = csv.lines();
        let header: Vec<&str> = lines.next().unwrap().split(',').collect();
        let idx = header.iter().position(|h| *h == name).unwrap();
        lines.next().unwrap().split(',').nth(idx).unwrap().parse().unwrap()
    };

    // Full history: 100k → 200k. Window from 2024-01-03: 110k → 200k,
    // with the dip to 105k inside it.
    let full_return = column(&full, "total_return");
    let oos_return = column(&oos, "total_return");
    assert!((full_return - 1.0).abs() < 1e-9);
    assert!((oos_return - (200_000.0 - 110_000.0) / 110_000.0).abs() < 1e-9);

    let oos_dd = column(&oos, "max_drawdown");
    let expected_dd = (105_000.0 - 110_000.0) / 110_000.0;
    assert!((oos_dd - expected_dd).abs() < 1e-9);
}
