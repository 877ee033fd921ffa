//! Backtest document parsing.
//!
//! A backtest response is a nested JSON document; the pipeline only touches a
//! small set of fields and passes the rest through untouched:
//! - `legend` — identifier and symphony name
//! - `first_day` / `last_market_day` — trading dates as integer days since the Unix epoch
//! - `tdvm_weights` — per-ticker allocation weights keyed by trading date
//! - `dvm_capital` — capital curve keyed by trading date
//! - `stats` — opaque summary statistics, carried as raw JSON values

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BacktestParseError {
    #[error("backtest document missing field '{0}'")]
    MissingField(&'static str),

    #[error("backtest document field '{field}' has unexpected shape")]
    BadShape { field: &'static str },

    #[error("invalid trading date '{0}' (expected non-negative days since epoch)")]
    BadTradingDate(String),
}

/// Convert an integer trading date (days since 1970-01-01) to a calendar date.
pub fn trading_date(days: i64) -> Result<NaiveDate, BacktestParseError> {
    if days < 0 {
        return Err(BacktestParseError::BadTradingDate(days.to_string()));
    }
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).expect("epoch is a valid date");
    epoch
        .checked_add_signed(Duration::days(days))
        .ok_or_else(|| BacktestParseError::BadTradingDate(days.to_string()))
}

fn trading_date_key(key: &str) -> Result<NaiveDate, BacktestParseError> {
    let days: i64 = key
        .parse()
        .map_err(|_| BacktestParseError::BadTradingDate(key.to_string()))?;
    trading_date(days)
}

/// Per-ticker allocation weights, dense over the backtest's calendar range.
///
/// Dates without a reported weight hold 0.0, mirroring how the platform
/// reports only days where an allocation changed.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationTable {
    tickers: Vec<String>,
    rows: BTreeMap<NaiveDate, Vec<f64>>,
}

impl AllocationTable {
    pub fn tickers(&self) -> &[String] {
        &self.tickers
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.rows.keys().copied()
    }

    pub fn weight(&self, date: NaiveDate, ticker: &str) -> Option<f64> {
        let col = self.tickers.iter().position(|t| t == ticker)?;
        self.rows.get(&date).map(|row| row[col])
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A capital curve keyed by calendar date, dense over the backtest range.
///
/// Zero values mark non-trading days and are filtered out before any metric
/// computation.
#[derive(Debug, Clone, PartialEq)]
pub struct ReturnSeries {
    points: BTreeMap<NaiveDate, f64>,
}

impl ReturnSeries {
    pub fn from_points(points: BTreeMap<NaiveDate, f64>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &BTreeMap<NaiveDate, f64> {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Capital values with non-trading (zero) days removed.
    ///
    /// If every value is zero the unfiltered values are returned, so callers
    /// always see the series' length rather than an empty vector.
    pub fn capital_values(&self) -> Vec<f64> {
        let filtered: Vec<f64> = self
            .points
            .values()
            .copied()
            .filter(|v| *v != 0.0)
            .collect();
        if filtered.is_empty() {
            self.points.values().copied().collect()
        } else {
            filtered
        }
    }

    /// The sub-series from `date` (inclusive) to the end.
    pub fn since(&self, date: NaiveDate) -> ReturnSeries {
        ReturnSeries {
            points: self
                .points
                .range(date..)
                .map(|(d, v)| (*d, *v))
                .collect(),
        }
    }
}

/// The sub-structures the pipeline extracts from one backtest response.
#[derive(Debug, Clone)]
pub struct BacktestDocument {
    pub id: String,
    pub name: String,
    pub first_day: NaiveDate,
    pub last_market_day: NaiveDate,
    pub allocations: AllocationTable,
    pub returns: ReturnSeries,
    pub stats: Map<String, Value>,
}

/// Parse a persisted backtest response into its usable sub-structures.
pub fn parse_backtest_document(doc: &Value) -> Result<BacktestDocument, BacktestParseError> {
    let legend = doc
        .get("legend")
        .and_then(Value::as_object)
        .ok_or(BacktestParseError::MissingField("legend"))?;
    let (id, entry) = legend
        .iter()
        .next()
        .ok_or(BacktestParseError::BadShape { field: "legend" })?;
    let name = entry
        .get("name")
        .and_then(Value::as_str)
        .ok_or(BacktestParseError::BadShape { field: "legend" })?
        .to_string();

    let first_day = trading_date(
        doc.get("first_day")
            .and_then(Value::as_i64)
            .ok_or(BacktestParseError::MissingField("first_day"))?,
    )?;
    let last_market_day = trading_date(
        doc.get("last_market_day")
            .and_then(Value::as_i64)
            .ok_or(BacktestParseError::MissingField("last_market_day"))?,
    )?;

    let weights = doc
        .get("tdvm_weights")
        .and_then(Value::as_object)
        .ok_or(BacktestParseError::MissingField("tdvm_weights"))?;
    let holdings = doc
        .get("last_market_days_holdings")
        .and_then(Value::as_object)
        .ok_or(BacktestParseError::MissingField("last_market_days_holdings"))?;

    // Ticker universe: final holdings plus anything that ever held weight.
    let mut tickers: Vec<String> = holdings.keys().cloned().collect();
    for ticker in weights.keys() {
        if !tickers.contains(ticker) {
            tickers.push(ticker.clone());
        }
    }
    tickers.sort();

    let mut rows: BTreeMap<NaiveDate, Vec<f64>> = BTreeMap::new();
    let mut day = first_day;
    while day <= last_market_day {
        rows.insert(day, vec![0.0; tickers.len()]);
        day += Duration::days(1);
    }

    for (ticker, by_date) in weights {
        let col = tickers
            .iter()
            .position(|t| t == ticker)
            .expect("ticker universe covers all weight keys");
        let by_date = by_date
            .as_object()
            .ok_or(BacktestParseError::BadShape { field: "tdvm_weights" })?;
        for (key, weight) in by_date {
            let date = trading_date_key(key)?;
            let weight = weight
                .as_f64()
                .ok_or(BacktestParseError::BadShape { field: "tdvm_weights" })?;
            if let Some(row) = rows.get_mut(&date) {
                row[col] = weight;
            }
        }
    }

    let capital = doc
        .get("dvm_capital")
        .and_then(Value::as_object)
        .and_then(|m| m.get(id.as_str()))
        .and_then(Value::as_object)
        .ok_or(BacktestParseError::MissingField("dvm_capital"))?;

    let mut points: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    let mut day = first_day;
    while day <= last_market_day {
        points.insert(day, 0.0);
        day += Duration::days(1);
    }
    for (key, value) in capital {
        let date = trading_date_key(key)?;
        let value = value
            .as_f64()
            .ok_or(BacktestParseError::BadShape { field: "dvm_capital" })?;
        if let Some(slot) = points.get_mut(&date) {
            *slot = value;
        }
    }

    let stats = doc
        .get("stats")
        .and_then(Value::as_object)
        .ok_or(BacktestParseError::MissingField("stats"))?
        .clone();

    Ok(BacktestDocument {
        id: id.clone(),
        name,
        first_day,
        last_market_day,
        allocations: AllocationTable { tickers, rows },
        returns: ReturnSeries { points },
        stats,
    })
}
