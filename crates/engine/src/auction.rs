//! Pre-market call auction assessment
//!
//! Turns a summary of the opening auction into the optional auction factor
//! consumed by the scorer. Ratios and ranges are percentages of the previous
//! close.

use serde::{Deserialize, Serialize};

use crate::types::{AuctionInput, GapType};

pub const HIGH_GAP_PCT: f64 = 3.0;
pub const GAP_PCT: f64 = 1.0;

pub const BASE_STRENGTH: f64 = 0.5;
/// Opening gaps in this band (percent) earn a proportional bonus
pub const MODERATE_GAP_BAND: (f64, f64) = (0.5, 3.0);
pub const MODERATE_GAP_BONUS: f64 = 0.2;
pub const LATE_BIAS_BONUS: f64 = 0.2;
pub const STABLE_RANGE_PCT: f64 = 5.0;
pub const STABLE_RANGE_BONUS: f64 = 0.1;
pub const ACTIVE_VOLUME_BONUS: f64 = 0.1;

/// Late-session share of auction volume that counts as committed buying
pub const COMMITTED_BIAS: f64 = 0.6;
pub const FLAT_OPEN_STRENGTH: f64 = 0.6;
/// Gap-downs shallower than this (percent) are still buyable
pub const SHALLOW_GAP_DOWN_PCT: f64 = -2.0;

const EPSILON: f64 = 1e-10;

/// Aggregated auction prints for one symbol
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AuctionTape {
    pub prev_close: f64,
    /// Indicative price at the end of the auction
    pub final_price: f64,
    pub high: f64,
    pub low: f64,
    /// Volume matched in the first half of the auction
    pub early_volume: f64,
    /// Volume matched in the second half of the auction
    pub late_volume: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpeningPlan {
    WaitForPullback,
    BuyAtOpen,
    BuyAfterAuction,
    BuyTheDip,
    Watch,
}

impl OpeningPlan {
    pub fn description(&self) -> &'static str {
        match self {
            OpeningPlan::WaitForPullback => "gap too large, wait for a pullback",
            OpeningPlan::BuyAtOpen => "moderate gap up with committed late buying, buy at the open",
            OpeningPlan::BuyAfterAuction => "strong flat open, buy after the auction",
            OpeningPlan::BuyTheDip => "shallow gap down, accumulate on weakness",
            OpeningPlan::Watch => "unremarkable auction, wait and watch",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AuctionAssessment {
    /// Final auction price versus previous close, percent
    pub ratio_pct: f64,
    /// Auction high-low range versus previous close, percent
    pub price_range_pct: f64,
    /// Late share of auction volume in [0, 1]
    pub capital_bias: f64,
    pub gap: GapType,
    /// Auction sub-score in [0, 1]
    pub strength: f64,
    pub plan: OpeningPlan,
}

impl AuctionAssessment {
    pub fn to_input(&self) -> AuctionInput {
        AuctionInput {
            score: self.strength,
            gap: self.gap,
        }
    }
}

pub fn classify_gap(ratio_pct: f64) -> GapType {
    if ratio_pct > HIGH_GAP_PCT {
        GapType::HighGapUp
    } else if ratio_pct > GAP_PCT {
        GapType::GapUp
    } else if ratio_pct > -GAP_PCT {
        GapType::Flat
    } else if ratio_pct > -HIGH_GAP_PCT {
        GapType::GapDown
    } else {
        GapType::LowGapDown
    }
}

fn strength(ratio_pct: f64, capital_bias: f64, price_range_pct: f64, volume: f64) -> f64 {
    let mut strength = BASE_STRENGTH;
    let (lo, hi) = MODERATE_GAP_BAND;
    if (lo..=hi).contains(&ratio_pct) {
        strength += MODERATE_GAP_BONUS * (ratio_pct / hi);
    }
    strength += LATE_BIAS_BONUS * capital_bias;
    if price_range_pct < STABLE_RANGE_PCT {
        strength += STABLE_RANGE_BONUS;
    }
    if volume > 0.0 {
        strength += ACTIVE_VOLUME_BONUS;
    }
    strength.clamp(0.0, 1.0)
}

fn plan(gap: GapType, ratio_pct: f64, capital_bias: f64, strength: f64) -> OpeningPlan {
    match gap {
        GapType::HighGapUp => OpeningPlan::WaitForPullback,
        GapType::GapUp if capital_bias > COMMITTED_BIAS => OpeningPlan::BuyAtOpen,
        GapType::Flat if strength > FLAT_OPEN_STRENGTH => OpeningPlan::BuyAfterAuction,
        GapType::GapDown if ratio_pct > SHALLOW_GAP_DOWN_PCT => OpeningPlan::BuyTheDip,
        _ => OpeningPlan::Watch,
    }
}

/// `None` when the previous close is not a usable reference price
pub fn assess(tape: &AuctionTape) -> Option<AuctionAssessment> {
    if !(tape.prev_close.is_finite() && tape.prev_close > 0.0 && tape.final_price.is_finite()) {
        return None;
    }
    let ratio_pct = (tape.final_price - tape.prev_close) / tape.prev_close * 100.0;
    let price_range_pct = ((tape.high - tape.low) / tape.prev_close * 100.0).max(0.0);
    let early = tape.early_volume.max(0.0);
    let late = tape.late_volume.max(0.0);
    let capital_bias = late / (early + late + EPSILON);

    let gap = classify_gap(ratio_pct);
    let strength = strength(ratio_pct, capital_bias, price_range_pct, early + late);

    Some(AuctionAssessment {
        ratio_pct,
        price_range_pct,
        capital_bias,
        gap,
        strength,
        plan: plan(gap, ratio_pct, capital_bias, strength),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_tape(final_price: f64, early: f64, late: f64) -> AuctionTape {
        AuctionTape {
            prev_close: 10.0,
            final_price,
            high: final_price.max(10.0) + 0.05,
            low: final_price.min(10.0) - 0.05,
            early_volume: early,
            late_volume: late,
        }
    }

    #[test]
    fn test_gap_classes() {
        assert_eq!(classify_gap(3.5), GapType::HighGapUp);
        assert_eq!(classify_gap(3.0), GapType::GapUp);
        assert_eq!(classify_gap(1.0), GapType::Flat);
        assert_eq!(classify_gap(-1.0), GapType::GapDown);
        assert_eq!(classify_gap(-3.0), GapType::LowGapDown);
    }

    #[test]
    fn test_moderate_gap_with_late_buying() {
        let a = assess(&make_tape(10.15, 200.0, 800.0)).unwrap();
        assert!((a.ratio_pct - 1.5).abs() < 1e-9);
        assert_eq!(a.gap, GapType::GapUp);
        assert!((a.capital_bias - 0.8).abs() < 1e-9);
        // 0.5 + 0.2 * 0.5 + 0.2 * 0.8 + 0.1 + 0.1
        assert!((a.strength - 0.96).abs() < 1e-9);
        assert_eq!(a.plan, OpeningPlan::BuyAtOpen);
        assert_eq!(a.to_input().score, a.strength);
    }

    #[test]
    fn test_strength_is_clamped_and_quiet_auction_watched() {
        let a = assess(&make_tape(10.3, 0.0, 1000.0)).unwrap();
        assert!(a.strength <= 1.0);

        let quiet = assess(&make_tape(9.75, 0.0, 0.0)).unwrap();
        assert_eq!(quiet.gap, GapType::GapDown);
        assert_eq!(quiet.capital_bias, 0.0);
        assert!((quiet.strength - 0.6).abs() < 1e-9);
        assert_eq!(quiet.plan, OpeningPlan::Watch);
    }

    #[test]
    fn test_invalid_reference_price() {
        let mut tape = make_tape(10.1, 1.0, 1.0);
        tape.prev_close = 0.0;
        assert!(assess(&tape).is_none());
    }
}
