//! Technical indicator bank
//!
//! Computes every per-candle indicator once per series. Values that need
//! more history than is available fall back to neutral defaults (RSI 50,
//! volume ratio 1.0, momentum 0) or are absent (moving averages, MACD,
//! volatility), never NaN.

use std::collections::BTreeMap;

use serde::Serialize;
use ta::indicators::{MovingAverageConvergenceDivergence, SimpleMovingAverage};
use ta::Next;

use crate::config::{IndicatorConfig, TRADING_DAYS_PER_YEAR};
use crate::error::{EngineError, EngineResult};
use crate::stats;
use crate::types::Series;

/// RSI reported when there is not enough history
pub const RSI_NEUTRAL: f64 = 50.0;
/// Volume ratio reported when there is not enough history
pub const VOLUME_RATIO_NEUTRAL: f64 = 1.0;
/// Guards divisions by a rolling mean or average loss
pub const EPSILON: f64 = 1e-10;

/// Scale a daily return volatility to a yearly figure
pub fn annualize(daily_volatility: f64) -> f64 {
    daily_volatility * TRADING_DAYS_PER_YEAR.sqrt()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MacdPoint {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

/// Indicator values at a single candle
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorSnapshot {
    pub index: usize,
    pub close: f64,
    /// Defined moving averages keyed by window
    pub ma: BTreeMap<usize, f64>,
    pub rsi: f64,
    pub macd: Option<MacdPoint>,
    pub volume_ratio: f64,
    /// Momentum keyed by lookback
    pub momentum: BTreeMap<usize, f64>,
    /// Raw (daily) return volatility
    pub volatility: Option<f64>,
}

impl IndicatorSnapshot {
    pub fn ma(&self, window: usize) -> Option<f64> {
        self.ma.get(&window).copied()
    }

    pub fn momentum(&self, lookback: usize) -> f64 {
        self.momentum.get(&lookback).copied().unwrap_or(0.0)
    }

    pub fn annualized_volatility(&self) -> Option<f64> {
        self.volatility.map(annualize)
    }
}

/// Column-oriented indicator values for a whole series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndicatorBank {
    closes: Vec<f64>,
    ma: BTreeMap<usize, Vec<Option<f64>>>,
    rsi: Vec<f64>,
    macd: Vec<Option<MacdPoint>>,
    volume_ratio: Vec<f64>,
    momentum: BTreeMap<usize, Vec<f64>>,
    volatility: Vec<Option<f64>>,
}

impl IndicatorBank {
    pub fn compute(series: &Series, config: &IndicatorConfig) -> EngineResult<Self> {
        let closes = series.closes();
        let volumes = series.volumes();

        let mut ma = BTreeMap::new();
        for &window in &config.ma_windows {
            ma.insert(window, rolling_mean(&closes, window)?);
        }

        let mut momentum = BTreeMap::new();
        for &lookback in &config.momentum_periods {
            momentum.insert(lookback, momentum_series(&closes, lookback));
        }

        let volume_ratio = rolling_mean(&volumes, config.volume_window)?
            .iter()
            .zip(&volumes)
            .map(|(avg, vol)| match avg {
                Some(avg) => vol / (avg + EPSILON),
                None => VOLUME_RATIO_NEUTRAL,
            })
            .collect();

        Ok(Self {
            rsi: rsi_series(&closes, config.rsi_period),
            macd: macd_series(&closes, config.macd_fast, config.macd_slow, config.macd_signal)?,
            volatility: volatility_series(&closes, config.volatility_window),
            volume_ratio,
            momentum,
            ma,
            closes,
        })
    }

    pub fn len(&self) -> usize {
        self.closes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }

    pub fn ma(&self, window: usize, index: usize) -> Option<f64> {
        self.ma.get(&window)?.get(index).copied().flatten()
    }

    pub fn rsi(&self, index: usize) -> f64 {
        self.rsi.get(index).copied().unwrap_or(RSI_NEUTRAL)
    }

    pub fn macd(&self, index: usize) -> Option<MacdPoint> {
        self.macd.get(index).copied().flatten()
    }

    pub fn volume_ratio(&self, index: usize) -> f64 {
        self.volume_ratio
            .get(index)
            .copied()
            .unwrap_or(VOLUME_RATIO_NEUTRAL)
    }

    pub fn momentum(&self, lookback: usize, index: usize) -> f64 {
        self.momentum
            .get(&lookback)
            .and_then(|m| m.get(index))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn volatility(&self, index: usize) -> Option<f64> {
        self.volatility.get(index).copied().flatten()
    }

    /// Mean volume ratio over `[start, end]`, both inclusive
    pub fn mean_volume_ratio(&self, start: usize, end: usize) -> f64 {
        let end = end.min(self.len().saturating_sub(1));
        if start > end {
            return VOLUME_RATIO_NEUTRAL;
        }
        stats::mean(&self.volume_ratio[start..=end]).unwrap_or(VOLUME_RATIO_NEUTRAL)
    }

    pub fn snapshot(&self, index: usize) -> Option<IndicatorSnapshot> {
        let close = *self.closes.get(index)?;
        Some(IndicatorSnapshot {
            index,
            close,
            ma: self
                .ma
                .iter()
                .filter_map(|(w, values)| values[index].map(|v| (*w, v)))
                .collect(),
            rsi: self.rsi(index),
            macd: self.macd(index),
            volume_ratio: self.volume_ratio(index),
            momentum: self
                .momentum
                .iter()
                .map(|(k, values)| (*k, values[index]))
                .collect(),
            volatility: self.volatility(index),
        })
    }

    pub fn latest(&self) -> Option<IndicatorSnapshot> {
        self.snapshot(self.len().checked_sub(1)?)
    }
}

// ============================================================================
// Individual indicator columns
// ============================================================================

/// Simple rolling mean, absent until `window` values have been seen
fn rolling_mean(values: &[f64], window: usize) -> EngineResult<Vec<Option<f64>>> {
    let mut sma = SimpleMovingAverage::new(window).map_err(|e| {
        EngineError::InvalidConfig(format!("moving average window {window}: {e:?}"))
    })?;
    Ok(values
        .iter()
        .enumerate()
        .map(|(i, v)| {
            let avg = sma.next(*v);
            (i + 1 >= window).then_some(avg)
        })
        .collect())
}

/// RSI from simple rolling means of gains and losses over `period` deltas
fn rsi_series(closes: &[f64], period: usize) -> Vec<f64> {
    let deltas: Vec<f64> = closes.windows(2).map(|w| w[1] - w[0]).collect();
    (0..closes.len())
        .map(|i| {
            if i < period {
                return RSI_NEUTRAL;
            }
            // deltas[j] is the change into candle j + 1
            let window = &deltas[i - period..i];
            let gain = window.iter().map(|d| d.max(0.0)).sum::<f64>() / period as f64;
            let loss = window.iter().map(|d| (-d).max(0.0)).sum::<f64>() / period as f64;
            let rs = gain / (loss + EPSILON);
            100.0 - 100.0 / (1.0 + rs)
        })
        .collect()
}

fn macd_series(
    closes: &[f64],
    fast: usize,
    slow: usize,
    signal: usize,
) -> EngineResult<Vec<Option<MacdPoint>>> {
    let mut macd = MovingAverageConvergenceDivergence::new(fast, slow, signal)
        .map_err(|e| EngineError::InvalidConfig(format!("MACD({fast},{slow},{signal}): {e:?}")))?;
    Ok(closes
        .iter()
        .enumerate()
        .map(|(i, close)| {
            let out = macd.next(*close);
            (i + 1 >= slow).then_some(MacdPoint {
                macd: out.macd,
                signal: out.signal,
                histogram: out.histogram,
            })
        })
        .collect())
}

fn momentum_series(closes: &[f64], lookback: usize) -> Vec<f64> {
    (0..closes.len())
        .map(|i| {
            if i < lookback || closes[i - lookback] <= 0.0 {
                0.0
            } else {
                closes[i] / closes[i - lookback] - 1.0
            }
        })
        .collect()
}

/// Rolling sample std of daily returns over `window` returns
fn volatility_series(closes: &[f64], window: usize) -> Vec<Option<f64>> {
    let returns: Vec<f64> = closes
        .windows(2)
        .map(|w| if w[0] > 0.0 { w[1] / w[0] - 1.0 } else { 0.0 })
        .collect();
    (0..closes.len())
        .map(|i| {
            // returns[i - 1] is the return into candle i
            if i < window {
                None
            } else {
                stats::sample_std(&returns[i - window..i])
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Candle;
    use chrono::NaiveDate;

    fn make_series(prices: &[f64]) -> Series {
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let candles = prices
            .iter()
            .enumerate()
            .map(|(i, &p)| Candle {
                timestamp: (start + chrono::Duration::days(i as i64))
                    .and_hms_opt(0, 0, 0)
                    .unwrap(),
                open: p,
                high: p + 0.5,
                low: p - 0.5,
                close: p,
                volume: 1000.0 + i as f64 * 10.0,
                amount: None,
            })
            .collect();
        Series::new("TEST", candles).unwrap()
    }

    fn bank(prices: &[f64]) -> IndicatorBank {
        IndicatorBank::compute(&make_series(prices), &IndicatorConfig::default()).unwrap()
    }

    #[test]
    fn test_rsi_neutral_with_short_history() {
        let prices: Vec<f64> = (0..14).map(|i| 10.0 + i as f64).collect();
        let bank = bank(&prices);
        for i in 0..prices.len() {
            assert_eq!(bank.rsi(i), RSI_NEUTRAL);
        }
        assert_eq!(bank.latest().unwrap().rsi, 50.0);
    }

    #[test]
    fn test_rsi_extremes() {
        let rising: Vec<f64> = (0..30).map(|i| 10.0 + i as f64).collect();
        assert!(bank(&rising).latest().unwrap().rsi > 99.0);

        let falling: Vec<f64> = (0..30).map(|i| 50.0 - i as f64).collect();
        assert!(bank(&falling).latest().unwrap().rsi < 1.0);
    }

    #[test]
    fn test_moving_average_absent_until_window() {
        let prices: Vec<f64> = (0..10).map(|i| 10.0 + i as f64).collect();
        let bank = bank(&prices);
        assert_eq!(bank.ma(5, 3), None);
        assert_eq!(bank.ma(5, 4), Some(12.0));
        assert_eq!(bank.ma(20, 9), None);
        let snap = bank.latest().unwrap();
        assert!(snap.ma(20).is_none());
        assert!((snap.ma(5).unwrap() - 17.0).abs() < 1e-9);
    }

    #[test]
    fn test_macd_requires_slow_window() {
        let prices: Vec<f64> = (0..40).map(|i| 10.0 + (i as f64 * 0.3).sin()).collect();
        let bank = bank(&prices);
        assert!(bank.macd(24).is_none());
        let point = bank.macd(25).unwrap();
        assert!((point.histogram - (point.macd - point.signal)).abs() < 1e-9);
    }

    #[test]
    fn test_volume_ratio_defaults_then_tracks() {
        let prices = vec![10.0; 25];
        let bank = bank(&prices);
        assert_eq!(bank.volume_ratio(5), VOLUME_RATIO_NEUTRAL);
        // volume grows linearly, so the latest bar sits above its rolling mean
        assert!(bank.volume_ratio(24) > 1.0);
    }

    #[test]
    fn test_momentum_and_volatility() {
        let prices: Vec<f64> = (0..30).map(|i| 10.0 * 1.01f64.powi(i)).collect();
        let bank = bank(&prices);
        assert_eq!(bank.momentum(5, 3), 0.0);
        let m = bank.momentum(5, 29);
        assert!((m - (1.01f64.powi(5) - 1.0)).abs() < 1e-9);

        // constant 1% returns have (numerically) zero dispersion
        assert!(bank.volatility(10).is_none());
        assert!(bank.volatility(29).unwrap() < 1e-9);
        assert!(bank.latest().unwrap().annualized_volatility().unwrap() < 1e-6);
    }

    #[test]
    fn test_mean_volume_ratio_out_of_range() {
        let bank = bank(&[10.0; 12]);
        assert_eq!(bank.mean_volume_ratio(5, 3), VOLUME_RATIO_NEUTRAL);
        assert_eq!(bank.mean_volume_ratio(0, 100), VOLUME_RATIO_NEUTRAL);
    }
}
