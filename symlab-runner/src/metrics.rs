//! Performance metrics — pure functions that compute strategy statistics.
//!
//! Every metric is a pure function: capital curve in, scalar out. No
//! dependencies on the fetchers or the store. The curve is the zero-filtered
//! capital series from a backtest document, one value per trading day.

use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use symlab_core::backtest::ReturnSeries;

/// Fallback start for out-of-sample windows when the symphony metadata does
/// not carry a last edit date.
pub const DEFAULT_OOS_START: NaiveDate = match NaiveDate::from_ymd_opt(2024, 12, 28) {
    Some(d) => d,
    None => panic!("valid date"),
};

/// Aggregate performance metrics for one capital curve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_return: f64,
    pub cagr: f64,
    pub sharpe: f64,
    pub sortino: f64,
    pub calmar: f64,
    pub max_drawdown: f64,
    pub volatility: f64,
    pub best_day: f64,
    pub worst_day: f64,
    pub win_day_rate: f64,
}

impl PerformanceMetrics {
    /// Compute all metrics from a capital curve.
    pub fn compute(capital: &[f64]) -> Self {
        let trading_days = capital.len();
        Self {
            total_return: total_return(capital),
            cagr: cagr(capital, trading_days),
            sharpe: sharpe_ratio(capital, 0.0),
            sortino: sortino_ratio(capital, 0.0),
            calmar: calmar_ratio(capital, trading_days),
            max_drawdown: max_drawdown(capital),
            volatility: volatility(capital),
            best_day: best_day(capital),
            worst_day: worst_day(capital),
            win_day_rate: win_day_rate(capital),
        }
    }

    /// Metric names and values as a JSON-valued map, for merging with the
    /// platform's own stats block. Non-finite values become null.
    pub fn to_value_map(&self) -> BTreeMap<String, Value> {
        [
            ("total_return", self.total_return),
            ("cagr", self.cagr),
            ("sharpe", self.sharpe),
            ("sortino", self.sortino),
            ("calmar", self.calmar),
            ("max_drawdown", self.max_drawdown),
            ("volatility", self.volatility),
            ("best_day", self.best_day),
            ("worst_day", self.worst_day),
            ("win_day_rate", self.win_day_rate),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), Value::from(v)))
        .collect()
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Total return as a fraction: (final - initial) / initial.
pub fn total_return(capital: &[f64]) -> f64 {
    if capital.len() < 2 {
        return 0.0;
    }
    let initial = capital[0];
    let final_cap = *capital.last().unwrap();
    if initial <= 0.0 {
        return 0.0;
    }
    (final_cap - initial) / initial
}

/// Compound Annual Growth Rate.
///
/// Assumes 252 trading days per year. Returns 0.0 for single-day or constant curves.
pub fn cagr(capital: &[f64], trading_days: usize) -> f64 {
    if capital.len() < 2 || trading_days < 2 {
        return 0.0;
    }
    let initial = capital[0];
    let final_cap = *capital.last().unwrap();
    if initial <= 0.0 || final_cap <= 0.0 {
        return 0.0;
    }
    let years = trading_days as f64 / 252.0;
    if years <= 0.0 {
        return 0.0;
    }
    (final_cap / initial).powf(1.0 / years) - 1.0
}

/// Annualized Sharpe ratio from daily returns.
///
/// Sharpe = mean(daily returns - rf) / std(daily returns) * sqrt(252).
/// Returns 0.0 if variance is zero or fewer than 2 days.
pub fn sharpe_ratio(capital: &[f64], risk_free_rate: f64) -> f64 {
    let returns = daily_returns(capital);
    if returns.len() < 2 {
        return 0.0;
    }
    let daily_rf = risk_free_rate / 252.0;
    let excess: Vec<f64> = returns.iter().map(|r| r - daily_rf).collect();
    let mean = mean_f64(&excess);
    let std = std_dev(&excess);
    if std < 1e-15 {
        return 0.0;
    }
    (mean / std) * (252.0_f64).sqrt()
}

/// Annualized Sortino ratio (downside deviation only).
///
/// Returns 0.0 if there is no downside or fewer than 2 days.
pub fn sortino_ratio(capital: &[f64], risk_free_rate: f64) -> f64 {
    let returns = daily_returns(capital);
    if returns.len() < 2 {
        return 0.0;
    }
    let daily_rf = risk_free_rate / 252.0;
    let excess: Vec<f64> = returns.iter().map(|r| r - daily_rf).collect();
    let mean = mean_f64(&excess);

    // Downside deviation: std of only negative excess returns
    let downside_sq: Vec<f64> = excess.iter().filter(|&&r| r < 0.0).map(|r| r * r).collect();

    if downside_sq.is_empty() {
        return 0.0;
    }

    let downside_var = downside_sq.iter().sum::<f64>() / returns.len() as f64;
    let downside_std = downside_var.sqrt();
    if downside_std < 1e-15 {
        return 0.0;
    }
    (mean / downside_std) * (252.0_f64).sqrt()
}

/// Calmar ratio: CAGR / |max_drawdown|.
///
/// Returns 0.0 if max drawdown is zero or CAGR is non-positive.
pub fn calmar_ratio(capital: &[f64], trading_days: usize) -> f64 {
    let c = cagr(capital, trading_days);
    let dd = max_drawdown(capital);
    if dd >= 0.0 || c <= 0.0 {
        return 0.0;
    }
    c / dd.abs()
}

/// Maximum drawdown as a negative fraction (e.g., -0.15 = 15% drawdown).
pub fn max_drawdown(capital: &[f64]) -> f64 {
    if capital.len() < 2 {
        return 0.0;
    }
    let mut peak = capital[0];
    let mut max_dd = 0.0_f64;

    for &cap in capital {
        if cap > peak {
            peak = cap;
        }
        if peak > 0.0 {
            let dd = (cap - peak) / peak;
            if dd < max_dd {
                max_dd = dd;
            }
        }
    }
    max_dd
}

/// Annualized volatility: std of daily returns * sqrt(252).
pub fn volatility(capital: &[f64]) -> f64 {
    let returns = daily_returns(capital);
    if returns.len() < 2 {
        return 0.0;
    }
    std_dev(&returns) * (252.0_f64).sqrt()
}

/// Largest single-day return, or 0.0 when there are no returns.
pub fn best_day(capital: &[f64]) -> f64 {
    daily_returns(capital)
        .into_iter()
        .reduce(f64::max)
        .unwrap_or(0.0)
}

/// Worst single-day return, or 0.0 when there are no returns.
pub fn worst_day(capital: &[f64]) -> f64 {
    daily_returns(capital)
        .into_iter()
        .reduce(f64::min)
        .unwrap_or(0.0)
}

/// Fraction of trading days with a positive return.
pub fn win_day_rate(capital: &[f64]) -> f64 {
    let returns = daily_returns(capital);
    if returns.is_empty() {
        return 0.0;
    }
    let winners = returns.iter().filter(|&&r| r > 0.0).count();
    winners as f64 / returns.len() as f64
}

// ─── Per-symphony metric maps ───────────────────────────────────────

/// Compute full-history metrics for every symphony with a usable curve.
///
/// Symphonies whose capital series has fewer than two points carry no
/// information and are skipped.
pub fn quant_metrics_by_id(
    returns: &HashMap<String, ReturnSeries>,
) -> HashMap<String, PerformanceMetrics> {
    let mut metrics = HashMap::new();
    for (id, series) in returns {
        let capital = series.capital_values();
        if capital.len() < 2 {
            debug!(%id, points = capital.len(), "capital curve too short, skipping");
            continue;
        }
        metrics.insert(id.clone(), PerformanceMetrics::compute(&capital));
    }
    metrics
}

/// Out-of-sample window starts, keyed by symphony id.
///
/// The window opens at the symphony's last edit date: performance before the
/// last edit was visible to the author, performance after it was not. Bodies
/// without an id are skipped; a missing or malformed edit date falls back to
/// [`DEFAULT_OOS_START`].
pub fn oos_start_dates(symphony_bodies: &[Value]) -> HashMap<String, NaiveDate> {
    let mut dates = HashMap::new();
    for body in symphony_bodies {
        let Some(id) = body.get("id").and_then(Value::as_str) else {
            warn!("symphony body has no id, skipping");
            continue;
        };
        let date = body
            .get("last_semantic_update_at")
            .and_then(Value::as_str)
            .filter(|s| s.len() >= 10)
            .and_then(|s| NaiveDate::parse_from_str(&s[..10], "%Y-%m-%d").ok())
            .unwrap_or(DEFAULT_OOS_START);
        dates.insert(id.to_string(), date);
    }
    dates
}

/// Compute metrics over each symphony's out-of-sample window.
///
/// Only ids present in both maps are computed. An id whose window holds fewer
/// than two capital points is skipped with a log line.
pub fn oos_metrics_by_id(
    returns: &HashMap<String, ReturnSeries>,
    oos_starts: &HashMap<String, NaiveDate>,
) -> HashMap<String, PerformanceMetrics> {
    let mut metrics = HashMap::new();
    for (id, series) in returns {
        let Some(start) = oos_starts.get(id) else {
            continue;
        };
        let window = series.since(*start);
        let capital = window.capital_values();
        if capital.len() < 2 {
            debug!(%id, start = %start, points = capital.len(), "out-of-sample window too short, skipping");
            continue;
        }
        metrics.insert(id.clone(), PerformanceMetrics::compute(&capital));
    }
    metrics
}

// ─── Helpers ────────────────────────────────────────────────────────

/// Compute daily returns from a capital curve.
pub fn daily_returns(capital: &[f64]) -> Vec<f64> {
    if capital.len() < 2 {
        return Vec::new();
    }
    capital
        .windows(2)
        .map(|w| {
            if w[0] > 0.0 {
                (w[1] - w[0]) / w[0]
            } else {
                0.0
            }
        })
        .collect()
}

pub(crate) fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}
