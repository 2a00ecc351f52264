//! Confirmation filters
//!
//! Checks run after the structure is known and before the score gate: a
//! daily uptrend, relative strength against the symbol's own recent past,
//! and volume behind the entry signal. Each one is switched on through
//! `SelectionConfig`; the measurements are always computed so `analyze`
//! can report them.

use serde::{Deserialize, Serialize};

use crate::config::{LeaderConfig, SelectionConfig, UptrendConfig, VolumeConfirmationConfig};
use crate::indicators::IndicatorBank;
use crate::stats;
use crate::structure::Structure;
use crate::types::{Series, SignalKind, Trend};

const PERCENT: f64 = 100.0;
/// Ratio reported when the comparison base has no volume
pub const NEUTRAL_VOLUME_RATIO: f64 = 1.0;

/// Return over the strength window and recent-over-prior volume activity
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LeaderStrength {
    pub return_pct: f64,
    pub volume_activity: f64,
}

impl LeaderStrength {
    pub fn is_leader(&self, config: &LeaderConfig) -> bool {
        (self.return_pct > config.return_pct && self.volume_activity > config.volume_activity)
            || self.return_pct > config.breakaway_return_pct
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolumeStats {
    /// Last volume over the mean of the trailing rolling averages
    pub volume_factor: f64,
    /// Mean of the most recent candles over the mean of those before them
    pub pullback_factor: f64,
}

impl VolumeStats {
    pub fn neutral() -> Self {
        Self {
            volume_factor: NEUTRAL_VOLUME_RATIO,
            pullback_factor: NEUTRAL_VOLUME_RATIO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Confirmation {
    pub uptrend: bool,
    /// `None` while the series is shorter than the strength window
    pub leader: Option<LeaderStrength>,
    pub volume: VolumeStats,
}

pub fn confirm(
    series: &Series,
    bank: &IndicatorBank,
    structure: &Structure,
    config: &SelectionConfig,
) -> Confirmation {
    Confirmation {
        uptrend: is_daily_uptrend(series, bank, structure, &config.uptrend),
        leader: leader_strength(series, &config.leader),
        volume: volume_stats(series, &config.volume_confirmation),
    }
}

/// Needs at least one pivot and `ma_window` candles. Passes when the close
/// clears the latest pivot high by `cross_ratio` and holds the moving
/// average, or when MACD sits above the threshold in a structural uptrend.
pub fn is_daily_uptrend(
    series: &Series,
    bank: &IndicatorBank,
    structure: &Structure,
    config: &UptrendConfig,
) -> bool {
    let (Some(pivot), Some(last)) = (structure.latest_pivot(), series.last()) else {
        return false;
    };
    if series.len() < config.ma_window {
        return false;
    }
    let idx = series.len() - 1;
    let close = last.close;

    let holds_ma = bank.ma(config.ma_window, idx).is_some_and(|ma| close > ma);
    let cleared_pivot = close > pivot.high * config.cross_ratio;
    // no MACD yet does not veto the trend branch
    let macd_ok = bank
        .macd(idx)
        .map_or(true, |m| m.macd > config.macd_threshold);

    (cleared_pivot && holds_ma) || (macd_ok && structure.trend == Trend::Up)
}

pub fn leader_strength(series: &Series, config: &LeaderConfig) -> Option<LeaderStrength> {
    let closes = series.closes();
    let n = closes.len();
    if n < config.strength_days {
        return None;
    }
    let base = closes[n - config.strength_days];
    let return_pct = if base > 0.0 {
        (closes[n - 1] / base - 1.0) * PERCENT
    } else {
        0.0
    };

    let volumes = series.volumes();
    let recent_start = n.saturating_sub(config.activity_recent);
    let prior_start = recent_start.saturating_sub(config.activity_prior);
    let volume_activity = ratio_of_means(&volumes[recent_start..], &volumes[prior_start..recent_start]);

    Some(LeaderStrength {
        return_pct,
        volume_activity,
    })
}

pub fn volume_stats(series: &Series, config: &VolumeConfirmationConfig) -> VolumeStats {
    let volumes = series.volumes();
    let n = volumes.len();
    let p = config.ma_period;
    if p == 0 || n < p {
        return VolumeStats::neutral();
    }

    let rolling: Vec<f64> = (n.saturating_sub(p).max(p - 1)..n)
        .filter_map(|j| stats::mean(&volumes[j + 1 - p..=j]))
        .collect();
    let volume_factor = match (volumes.last(), stats::mean(&rolling)) {
        (Some(last), Some(avg)) if avg > 0.0 => last / avg,
        _ => NEUTRAL_VOLUME_RATIO,
    };

    let recent_start = n.saturating_sub(config.pullback_recent);
    let prior_start = recent_start.saturating_sub(config.pullback_prior);
    let pullback_factor = ratio_of_means(&volumes[recent_start..], &volumes[prior_start..recent_start]);

    VolumeStats {
        volume_factor,
        pullback_factor,
    }
}

/// Breakouts and continuations need expanding volume, pullbacks need it to
/// dry up. No signal has nothing to confirm.
pub fn volume_confirms(kind: SignalKind, stats: &VolumeStats, config: &VolumeConfirmationConfig) -> bool {
    match kind {
        SignalKind::SecondBuy | SignalKind::TrendContinuation => stats.volume_factor >= config.breakout_min,
        SignalKind::ThirdBuy => stats.pullback_factor <= config.pullback_max,
        SignalKind::NoSignal => true,
    }
}

fn ratio_of_means(recent: &[f64], prior: &[f64]) -> f64 {
    match (stats::mean(recent), stats::mean(prior)) {
        (Some(r), Some(p)) if p > 0.0 => r / p,
        _ => NEUTRAL_VOLUME_RATIO,
    }
}
