//! Candle series normalizer
//!
//! Turns raw, possibly noisy OHLCV rows into a validated `Series`.
//! Malformed rows are dropped and counted; only "too few rows left" is
//! reported to the caller, as `EngineError::InsufficientData`.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{EngineError, EngineResult};
use crate::types::{Candle, Series};

/// A numeric field as delivered upstream: a number or a string token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Number(f64),
    Text(String),
}

impl From<f64> for RawValue {
    fn from(v: f64) -> Self {
        RawValue::Number(v)
    }
}

impl From<&str> for RawValue {
    fn from(v: &str) -> Self {
        RawValue::Text(v.to_string())
    }
}

/// One unvalidated input row
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRow {
    #[serde(default, alias = "timestamp", alias = "time")]
    pub date: String,
    #[serde(default)]
    pub open: Option<RawValue>,
    #[serde(default)]
    pub high: Option<RawValue>,
    #[serde(default)]
    pub low: Option<RawValue>,
    #[serde(default)]
    pub close: Option<RawValue>,
    #[serde(default)]
    pub volume: Option<RawValue>,
    #[serde(default)]
    pub amount: Option<RawValue>,
}

/// Parse a field to a finite float. Noisy sources sometimes concatenate
/// several values into one cell; only the first token counts.
pub fn coerce(value: Option<&RawValue>) -> Option<f64> {
    let parsed = match value? {
        RawValue::Number(n) => *n,
        RawValue::Text(s) => s.split_whitespace().next()?.parse::<f64>().ok()?,
    };
    parsed.is_finite().then_some(parsed)
}

pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];
    const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y%m%d", "%Y/%m/%d"];

    DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(raw, f).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(raw, f).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn clean_row(row: &RawRow) -> Option<Candle> {
    let timestamp = parse_timestamp(&row.date)?;
    let high = coerce(row.high.as_ref())?;
    let low = coerce(row.low.as_ref())?;
    let close = coerce(row.close.as_ref())?;

    if high <= 0.0 || low <= 0.0 || close <= 0.0 {
        return None;
    }
    if high < low || close < low || close > high {
        return None;
    }

    let open = coerce(row.open.as_ref())
        .filter(|o| *o > 0.0)
        .unwrap_or(close)
        .clamp(low, high);
    let volume = coerce(row.volume.as_ref())
        .filter(|v| *v >= 0.0)
        .unwrap_or(0.0);
    let amount = coerce(row.amount.as_ref()).filter(|a| *a >= 0.0);

    Some(Candle {
        timestamp,
        open,
        high,
        low,
        close,
        volume,
        amount,
    })
}

/// Clean `rows` into a series. Fewer than `min_rows` surviving candles is
/// `InsufficientData`, which callers treat as "no result for this symbol".
pub fn normalize(symbol: &str, rows: &[RawRow], min_rows: usize) -> EngineResult<Series> {
    let mut candles: Vec<Candle> = rows.iter().filter_map(clean_row).collect();
    candles.sort_by_key(|c| c.timestamp);

    // Duplicate timestamps: the later row wins
    let mut deduped: Vec<Candle> = Vec::with_capacity(candles.len());
    for candle in candles {
        match deduped.last_mut() {
            Some(last) if last.timestamp == candle.timestamp => *last = candle,
            _ => deduped.push(candle),
        }
    }

    let dropped = rows.len() - deduped.len();
    debug!(
        symbol,
        raw = rows.len(),
        kept = deduped.len(),
        dropped,
        "Normalized candle series"
    );

    if deduped.len() < min_rows {
        return Err(EngineError::InsufficientData {
            available: deduped.len(),
            required: min_rows,
        });
    }

    Ok(Series::from_clean(symbol.to_string(), deduped, dropped))
}
