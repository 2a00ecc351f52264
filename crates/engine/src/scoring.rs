//! Multi-factor scoring
//!
//! Every factor is computed independently into [0, 1] and fused with the
//! configured weights. When no auction factor is supplied the remaining
//! weights are re-normalized so the total stays in [0, 1].

use crate::config::{FactorWeights, ScoringConfig, TierThresholds};
use crate::indicators::{IndicatorBank, IndicatorSnapshot};
use crate::stats;
use crate::structure::Structure;
use crate::types::{AuctionInput, ConfidenceTier, FactorScores, Series, SignalKind, Trend};

// ===== Technical factor =====
pub const TECH_MA_WEIGHT: f64 = 0.3;
pub const TECH_RSI_WEIGHT: f64 = 0.2;
pub const TECH_MACD_WEIGHT: f64 = 0.2;
pub const TECH_STRUCTURE_WEIGHT: f64 = 0.3;

pub const MA_FULL_ALIGNMENT: f64 = 1.0;
pub const MA_SHORT_ALIGNMENT: f64 = 0.6;
pub const MA_ABOVE_SHORT: f64 = 0.3;

/// (lower, upper, score) RSI bands, checked in order
pub const RSI_BANDS: [(f64, f64, f64); 3] = [(30.0, 70.0, 1.0), (25.0, 75.0, 0.7), (20.0, 80.0, 0.4)];

pub const MACD_BULLISH_ABOVE_ZERO: f64 = 1.0;
pub const MACD_BULLISH: f64 = 0.7;

pub const STRUCTURE_BREAKOUT: f64 = 0.9;
pub const STRUCTURE_PULLBACK: f64 = 0.7;
pub const STRUCTURE_CONTINUATION: f64 = 0.6;
pub const STRUCTURE_UPTREND: f64 = 0.5;

// ===== Volume factor =====
pub const VOL_TREND_WEIGHT: f64 = 0.3;
pub const VOL_CORRELATION_WEIGHT: f64 = 0.3;
pub const VOL_RATIO_WEIGHT: f64 = 0.2;
pub const VOL_SURGE_WEIGHT: f64 = 0.2;
/// Candles in each half of the rising-volume comparison
pub const VOL_TREND_SPAN: usize = 5;
pub const VOL_SURGE_MULTIPLE: f64 = 2.0;
pub const VOL_RISING_SCORE: f64 = 1.0;
pub const VOL_FLAT_SCORE: f64 = 0.3;
/// Volume ratio above which the ratio score scales with the ratio
pub const VOL_RATIO_ACTIVE: f64 = 1.0;
/// A ratio of this many times average saturates the ratio score
pub const VOL_RATIO_SATURATION: f64 = 2.0;
pub const VOL_RATIO_QUIET_SCORE: f64 = 0.2;
pub const VOL_SURGE_SCORE: f64 = 0.8;
pub const VOL_NO_SURGE_SCORE: f64 = 0.4;

// ===== Momentum factor =====
pub const MOM_RETURN_WEIGHT: f64 = 0.5;
pub const MOM_STABILITY_WEIGHT: f64 = 0.3;
pub const MOM_UP_DAYS_WEIGHT: f64 = 0.2;
/// A +20% return over the momentum period moves the return score by 1.0
pub const MOM_RETURN_SCALE_PCT: f64 = 20.0;
/// Return score of a flat period
pub const MOM_RETURN_NEUTRAL: f64 = 0.5;
/// A daily return std of 1 / this scale zeroes the stability score
pub const MOM_STABILITY_SCALE: f64 = 10.0;
const PERCENT: f64 = 100.0;

/// (annualized volatility upper bound, score), checked in order
pub const VOLATILITY_BANDS: [(f64, f64); 4] = [(0.2, 1.0), (0.4, 0.8), (0.6, 0.6), (0.8, 0.4)];
pub const VOLATILITY_FLOOR_SCORE: f64 = 0.2;

fn unit(x: f64) -> f64 {
    if x.is_finite() {
        x.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

// ============================================================================
// Factors
// ============================================================================

/// Moving average alignment, RSI band, MACD state and structural signal
pub fn technical_score(snapshot: &IndicatorSnapshot, structure: &Structure, alignment: [usize; 3]) -> f64 {
    let [short, mid, long] = alignment.map(|w| snapshot.ma(w));
    let ma_score = match (short, mid, long) {
        (Some(s), Some(m), Some(l)) if s > m && m > l => MA_FULL_ALIGNMENT,
        (Some(s), Some(m), _) if s > m => MA_SHORT_ALIGNMENT,
        (Some(s), _, _) if snapshot.close > s => MA_ABOVE_SHORT,
        _ => 0.0,
    };

    let rsi_score = RSI_BANDS
        .iter()
        .find(|(lo, hi, _)| (*lo..=*hi).contains(&snapshot.rsi))
        .map_or(0.0, |(_, _, score)| *score);

    let macd_score = match snapshot.macd {
        Some(m) if m.macd > m.signal && m.macd > 0.0 => MACD_BULLISH_ABOVE_ZERO,
        Some(m) if m.macd > m.signal => MACD_BULLISH,
        _ => 0.0,
    };

    let structure_score = match structure.signal.kind {
        SignalKind::SecondBuy => STRUCTURE_BREAKOUT,
        SignalKind::ThirdBuy => STRUCTURE_PULLBACK,
        SignalKind::TrendContinuation => STRUCTURE_CONTINUATION,
        SignalKind::NoSignal if structure.trend == Trend::Up => STRUCTURE_UPTREND,
        SignalKind::NoSignal => 0.0,
    };

    unit(
        ma_score * TECH_MA_WEIGHT
            + rsi_score * TECH_RSI_WEIGHT
            + macd_score * TECH_MACD_WEIGHT
            + structure_score * TECH_STRUCTURE_WEIGHT,
    )
}

/// Rising volume, price/volume agreement, current ratio and surge over the
/// trailing `window` candles
pub fn volume_score(series: &Series, bank: &IndicatorBank, window: usize) -> f64 {
    let candles = series.candles();
    let Some(last_idx) = candles.len().checked_sub(1) else {
        return 0.0;
    };
    let recent = &candles[candles.len().saturating_sub(window)..];
    let volumes: Vec<f64> = recent.iter().map(|c| c.volume).collect();

    let trend_score = if volumes.len() >= 2 * VOL_TREND_SPAN {
        let n = volumes.len();
        let last = stats::mean(&volumes[n - VOL_TREND_SPAN..]).unwrap_or(0.0);
        let prior = stats::mean(&volumes[n - 2 * VOL_TREND_SPAN..n - VOL_TREND_SPAN]).unwrap_or(0.0);
        if last > prior {
            VOL_RISING_SCORE
        } else {
            VOL_FLAT_SCORE
        }
    } else {
        VOL_FLAT_SCORE
    };

    // Paired changes; pairs with a zero base on either side are skipped
    let (price_changes, volume_changes): (Vec<f64>, Vec<f64>) = recent
        .windows(2)
        .filter(|w| w[0].close > 0.0 && w[0].volume > 0.0)
        .map(|w| (w[1].close / w[0].close - 1.0, w[1].volume / w[0].volume - 1.0))
        .unzip();
    let corr_score = stats::correlation(&price_changes, &volume_changes)
        .unwrap_or(0.0)
        .max(0.0);

    let ratio = bank.volume_ratio(last_idx);
    let ratio_score = if ratio > VOL_RATIO_ACTIVE {
        (ratio / VOL_RATIO_SATURATION).min(1.0)
    } else {
        VOL_RATIO_QUIET_SCORE
    };

    let surge = match (volumes.last(), stats::mean(&volumes)) {
        (Some(last), Some(avg)) => *last > avg * VOL_SURGE_MULTIPLE,
        _ => false,
    };
    let surge_score = if surge { VOL_SURGE_SCORE } else { VOL_NO_SURGE_SCORE };

    unit(
        trend_score * VOL_TREND_WEIGHT
            + corr_score * VOL_CORRELATION_WEIGHT
            + ratio_score * VOL_RATIO_WEIGHT
            + surge_score * VOL_SURGE_WEIGHT,
    )
}

/// Recent return, return stability and share of up days
pub fn momentum_score(series: &Series, bank: &IndicatorBank, window: usize, period: usize) -> f64 {
    let closes = series.closes();
    let Some(last_idx) = closes.len().checked_sub(1) else {
        return 0.0;
    };
    let returns = stats::pct_changes(&closes[closes.len().saturating_sub(window)..]);

    let return_pct = bank.momentum(period, last_idx) * PERCENT;
    let return_score = unit(return_pct / MOM_RETURN_SCALE_PCT + MOM_RETURN_NEUTRAL);
    let stability_score =
        (1.0 - stats::sample_std(&returns).unwrap_or(0.0) * MOM_STABILITY_SCALE).max(0.0);
    let up_days_score = if returns.is_empty() {
        0.0
    } else {
        returns.iter().filter(|r| **r > 0.0).count() as f64 / returns.len() as f64
    };

    unit(
        return_score * MOM_RETURN_WEIGHT
            + stability_score * MOM_STABILITY_WEIGHT
            + up_days_score * MOM_UP_DAYS_WEIGHT,
    )
}

/// Lower volatility scores higher
pub fn volatility_score(annualized: f64) -> f64 {
    if !annualized.is_finite() {
        return VOLATILITY_FLOOR_SCORE;
    }
    VOLATILITY_BANDS
        .iter()
        .find(|(bound, _)| annualized < *bound)
        .map_or(VOLATILITY_FLOOR_SCORE, |(_, score)| *score)
}

/// Latest rolling volatility, annualized. Falls back to the whole-series
/// return dispersion while the rolling window is still filling.
pub fn annualized_volatility(series: &Series, bank: &IndicatorBank) -> f64 {
    let rolling = bank.latest().and_then(|s| s.annualized_volatility());
    rolling
        .or_else(|| stats::sample_std(&stats::pct_changes(&series.closes())).map(crate::indicators::annualize))
        .unwrap_or(0.0)
}

pub fn score_factors(
    series: &Series,
    bank: &IndicatorBank,
    structure: &Structure,
    auction: Option<&AuctionInput>,
    config: &ScoringConfig,
) -> FactorScores {
    let technical = bank
        .latest()
        .map_or(0.0, |snap| technical_score(&snap, structure, config.alignment_windows));
    FactorScores {
        technical,
        volume: volume_score(series, bank, config.score_window),
        momentum: momentum_score(series, bank, config.score_window, config.momentum_score_period),
        volatility: volatility_score(annualized_volatility(series, bank)),
        auction: auction.map(|a| unit(a.score)),
    }
}

// ============================================================================
// Fusion and gating
// ============================================================================

/// Weighted total. The auction weight only applies when an auction score is
/// present; otherwise the other four are scaled back up to sum to 1.0.
pub fn total_score(scores: &FactorScores, weights: &FactorWeights) -> f64 {
    let w = weights.effective(scores.auction.is_some());
    unit(
        scores.technical * w.technical
            + scores.volume * w.volume
            + scores.momentum * w.momentum
            + scores.volatility * w.volatility
            + scores.auction.unwrap_or(0.0) * w.auction,
    )
}

pub fn tier_for(total: f64, tiers: &TierThresholds) -> ConfidenceTier {
    if total > tiers.very_high {
        ConfidenceTier::VeryHigh
    } else if total >= tiers.high {
        ConfidenceTier::High
    } else if total >= tiers.medium {
        ConfidenceTier::Medium
    } else {
        ConfidenceTier::Low
    }
}

pub fn passes_gate(total: f64, min_score: f64) -> bool {
    total >= min_score
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IndicatorConfig;
    use crate::indicators::MacdPoint;
    use crate::types::{Candle, GapType, Signal};
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    fn make_series(prices: &[f64], volumes: &[f64]) -> Series {
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let candles = prices
            .iter()
            .zip(volumes)
            .enumerate()
            .map(|(i, (&p, &v))| Candle {
                timestamp: (start + chrono::Duration::days(i as i64))
                    .and_hms_opt(0, 0, 0)
                    .unwrap(),
                open: p,
                high: p * 1.01,
                low: p * 0.99,
                close: p,
                volume: v,
                amount: None,
            })
            .collect();
        Series::new("TEST", candles).unwrap()
    }

    fn make_snapshot(close: f64, mas: &[(usize, f64)], rsi: f64, macd: Option<(f64, f64)>) -> IndicatorSnapshot {
        IndicatorSnapshot {
            index: 0,
            close,
            ma: mas.iter().copied().collect::<BTreeMap<_, _>>(),
            rsi,
            macd: macd.map(|(m, s)| MacdPoint {
                macd: m,
                signal: s,
                histogram: m - s,
            }),
            volume_ratio: 1.0,
            momentum: BTreeMap::new(),
            volatility: None,
        }
    }

    fn structure_with(kind: SignalKind, trend: Trend) -> Structure {
        let mut structure = Structure::neutral(10.0);
        structure.signal = Signal {
            kind,
            ..Signal::none(10.0)
        };
        structure.trend = trend;
        structure
    }

    #[test]
    fn test_technical_score_components() {
        let snap = make_snapshot(11.0, &[(5, 10.8), (10, 10.5), (20, 10.0)], 55.0, Some((0.2, 0.1)));
        let structure = structure_with(SignalKind::SecondBuy, Trend::Up);
        let score = technical_score(&snap, &structure, [5, 10, 20]);
        assert!((score - (0.3 + 0.2 + 0.2 + 0.27)).abs() < 1e-9);

        // nothing lines up
        let snap = make_snapshot(9.0, &[(5, 10.0), (10, 10.5)], 90.0, Some((-0.2, 0.1)));
        let structure = structure_with(SignalKind::NoSignal, Trend::Side);
        assert_eq!(technical_score(&snap, &structure, [5, 10, 20]), 0.0);
    }

    #[test]
    fn test_rsi_and_macd_bands() {
        let structure = structure_with(SignalKind::NoSignal, Trend::Side);
        let at = |rsi: f64, macd: Option<(f64, f64)>| {
            technical_score(&make_snapshot(10.0, &[], rsi, macd), &structure, [5, 10, 20])
        };
        assert!((at(72.0, None) - 0.14).abs() < 1e-9);
        assert!((at(21.0, None) - 0.08).abs() < 1e-9);
        assert!((at(50.0, Some((-0.1, -0.2))) - (0.2 + 0.14)).abs() < 1e-9);
    }

    #[test]
    fn test_volatility_buckets() {
        assert_eq!(volatility_score(0.1), 1.0);
        assert_eq!(volatility_score(0.2), 0.8);
        assert_eq!(volatility_score(0.59), 0.6);
        assert_eq!(volatility_score(0.79), 0.4);
        assert_eq!(volatility_score(2.0), 0.2);
        assert_eq!(volatility_score(f64::NAN), 0.2);
    }

    #[test]
    fn test_volume_score_rewards_rising_volume() {
        let prices: Vec<f64> = (0..30).map(|i| 10.0 + i as f64 * 0.05).collect();
        let rising: Vec<f64> = (0..30).map(|i| 1000.0 + i as f64 * 100.0).collect();
        let falling: Vec<f64> = rising.iter().rev().copied().collect();

        let config = IndicatorConfig::default();
        let up = make_series(&prices, &rising);
        let down = make_series(&prices, &falling);
        let up_score = volume_score(&up, &IndicatorBank::compute(&up, &config).unwrap(), 20);
        let down_score = volume_score(&down, &IndicatorBank::compute(&down, &config).unwrap(), 20);
        assert!(up_score > down_score);
        assert!((0.0..=1.0).contains(&up_score));
    }

    #[test]
    fn test_volume_score_zero_volume() {
        let prices: Vec<f64> = (0..25).map(|i| 10.0 + i as f64 * 0.1).collect();
        let series = make_series(&prices, &[0.0; 25]);
        let bank = IndicatorBank::compute(&series, &IndicatorConfig::default()).unwrap();
        let score = volume_score(&series, &bank, 20);
        // flat volume: no rise, no correlation, quiet ratio, no surge
        let expected = VOL_FLAT_SCORE * VOL_TREND_WEIGHT
            + VOL_RATIO_QUIET_SCORE * VOL_RATIO_WEIGHT
            + VOL_NO_SURGE_SCORE * VOL_SURGE_WEIGHT;
        assert!((score - expected).abs() < 1e-9);
        assert!((expected - 0.21).abs() < 1e-9);
    }

    #[test]
    fn test_momentum_score_flat_series() {
        let series = make_series(&[10.0; 30], &[1000.0; 30]);
        let bank = IndicatorBank::compute(&series, &IndicatorConfig::default()).unwrap();
        // zero return, perfectly stable, no up days
        let expected = MOM_RETURN_NEUTRAL * MOM_RETURN_WEIGHT + MOM_STABILITY_WEIGHT;
        assert!((momentum_score(&series, &bank, 20, 10) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_momentum_score_direction() {
        let volumes = vec![1000.0; 30];
        let rising: Vec<f64> = (0..30).map(|i| 10.0 * 1.005f64.powi(i)).collect();
        let falling: Vec<f64> = (0..30).map(|i| 10.0 * 0.995f64.powi(i)).collect();
        let config = IndicatorConfig::default();

        let up = make_series(&rising, &volumes);
        let down = make_series(&falling, &volumes);
        let up_score = momentum_score(&up, &IndicatorBank::compute(&up, &config).unwrap(), 20, 10);
        let down_score = momentum_score(&down, &IndicatorBank::compute(&down, &config).unwrap(), 20, 10);
        assert!(up_score > down_score);
        assert!(up_score <= 1.0 && down_score >= 0.0);
    }

    #[test]
    fn test_total_renormalizes_without_auction() {
        let weights = FactorWeights::default();
        let all_ones = FactorScores {
            technical: 1.0,
            volume: 1.0,
            momentum: 1.0,
            volatility: 1.0,
            auction: None,
        };
        assert!((total_score(&all_ones, &weights) - 1.0).abs() < 1e-9);

        let with_auction = FactorScores {
            auction: Some(0.0),
            ..all_ones
        };
        assert!((total_score(&with_auction, &weights) - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_auction_score_is_clamped() {
        let prices: Vec<f64> = (0..30).map(|i| 10.0 + i as f64 * 0.05).collect();
        let series = make_series(&prices, &[1000.0; 30]);
        let bank = IndicatorBank::compute(&series, &IndicatorConfig::default()).unwrap();
        let structure = Structure::neutral(11.45);
        let auction = AuctionInput {
            score: 1.7,
            gap: GapType::GapUp,
        };
        let scores = score_factors(&series, &bank, &structure, Some(&auction), &ScoringConfig::default());
        assert_eq!(scores.auction, Some(1.0));
    }

    #[test]
    fn test_tiers_and_gate() {
        let tiers = TierThresholds::default();
        assert_eq!(tier_for(0.64, &tiers), ConfidenceTier::Low);
        assert_eq!(tier_for(0.66, &tiers), ConfidenceTier::Medium);
        assert_eq!(tier_for(0.75, &tiers), ConfidenceTier::High);
        assert_eq!(tier_for(0.85, &tiers), ConfidenceTier::High);
        assert_eq!(tier_for(0.86, &tiers), ConfidenceTier::VeryHigh);
        assert!(!passes_gate(0.64, 0.65));
        assert!(passes_gate(0.66, 0.65));
    }
}
