//! Entry, stop and target levels plus position sizing

use serde::{Deserialize, Serialize};

use crate::config::RiskConfig;
use crate::types::Pivot;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TradeLevels {
    pub entry: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    /// Reward per unit of risk, 0 when the stop is not below entry
    pub risk_reward_ratio: f64,
}

/// Entry at the close. The stop is the tighter of the flat percentage stop
/// and a buffered stop under the latest pivot low, the latter only when it
/// sits below entry.
pub fn trade_levels(entry: f64, latest_pivot: Option<&Pivot>, config: &RiskConfig) -> TradeLevels {
    let flat_stop = entry * (1.0 - config.stop_loss_pct);
    let stop_loss = latest_pivot
        .map(|p| p.low * config.pivot_stop_buffer)
        .filter(|s| *s < entry)
        .map_or(flat_stop, |pivot_stop| pivot_stop.max(flat_stop));

    let risk = entry - stop_loss;
    let take_profit = entry + risk * config.reward_multiple;
    let risk_reward_ratio = if risk > 0.0 {
        (take_profit - entry) / risk
    } else {
        0.0
    };

    TradeLevels {
        entry,
        stop_loss,
        take_profit,
        risk_reward_ratio,
    }
}

/// Whole shares to buy so that a stop-out loses at most `max_account_risk`
/// of equity and the position never exceeds `max_position_pct` of equity.
pub fn position_size(equity: f64, entry: f64, stop: f64, config: &RiskConfig) -> u64 {
    if !(equity > 0.0 && entry > 0.0 && entry > stop) {
        return 0;
    }
    let by_risk = equity * config.max_account_risk / (entry - stop);
    let by_weight = equity * config.max_position_pct / entry;
    let shares = by_risk.min(by_weight).floor();
    if shares.is_finite() && shares > 0.0 {
        shares as u64
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Direction;

    fn make_pivot(low: f64, high: f64) -> Pivot {
        Pivot {
            start_idx: 0,
            end_idx: 30,
            high,
            low,
            center: (high + low) / 2.0,
            strength: (high - low) / ((high + low) / 2.0),
            volume_density: 1000.0,
            breakout_probability: 0.5,
            direction_bias: Direction::Up,
            first_segment: 0,
        }
    }

    #[test]
    fn test_flat_stop_without_pivot() {
        let levels = trade_levels(10.0, None, &RiskConfig::default());
        assert!((levels.stop_loss - 9.2).abs() < 1e-9);
        assert!((levels.take_profit - 12.4).abs() < 1e-9);
        assert!((levels.risk_reward_ratio - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_pivot_stop_used_when_tighter() {
        let pivot = make_pivot(9.8, 10.5);
        let levels = trade_levels(10.0, Some(&pivot), &RiskConfig::default());
        // 9.8 x 0.98 = 9.604 is above the flat 9.2
        assert!((levels.stop_loss - 9.604).abs() < 1e-9);
        assert!(levels.take_profit > levels.entry);
    }

    #[test]
    fn test_pivot_stop_above_entry_ignored() {
        let pivot = make_pivot(11.0, 12.0);
        let levels = trade_levels(10.0, Some(&pivot), &RiskConfig::default());
        assert!((levels.stop_loss - 9.2).abs() < 1e-9);
    }

    #[test]
    fn test_position_size_caps() {
        let config = RiskConfig::default();
        // risk cap: 100k x 2% / 0.8 = 2500; weight cap: 100k x 10% / 10 = 1000
        assert_eq!(position_size(100_000.0, 10.0, 9.2, &config), 1000);
        // wide stop: risk cap binds
        assert_eq!(position_size(100_000.0, 100.0, 60.0, &config), 50);
        assert_eq!(position_size(100_000.0, 10.0, 10.0, &config), 0);
        assert_eq!(position_size(0.0, 10.0, 9.0, &config), 0);
    }
}
