//! Consolidation zone (pivot) detection
//!
//! A pivot is the overlap of three consecutive alternating segments. For an
//! up-down-up triple the zone is capped by the lower of the two rally highs
//! and floored by the pullback low; down-up-down is the mirror image.

use crate::indicators::IndicatorBank;
use crate::stats;
use crate::types::{Direction, Pivot, Segment, Series};

pub const BREAKOUT_VOLUME_WEIGHT: f64 = 0.3;
pub const BREAKOUT_VOLATILITY_WEIGHT: f64 = 0.2;
pub const BREAKOUT_PROBABILITY_FLOOR: f64 = 0.1;
pub const BREAKOUT_PROBABILITY_CAP: f64 = 0.9;
/// Return std is taken in percent before weighting
pub const BREAKOUT_VOLATILITY_SCALE: f64 = 100.0;

/// Scan every consecutive segment triple and keep the valid zones, in index
/// order. Zones may overlap.
pub fn detect_pivots(
    series: &Series,
    segments: &[Segment],
    bank: &IndicatorBank,
    strength_min: f64,
) -> Vec<Pivot> {
    segments
        .windows(3)
        .enumerate()
        .filter_map(|(i, triple)| {
            pivot_from(series, [&triple[0], &triple[1], &triple[2]], bank, strength_min, i)
        })
        .collect()
}

/// The last `n` pivots, oldest first
pub fn recent(pivots: &[Pivot], n: usize) -> &[Pivot] {
    &pivots[pivots.len().saturating_sub(n)..]
}

fn pivot_from(
    series: &Series,
    [seg1, seg2, seg3]: [&Segment; 3],
    bank: &IndicatorBank,
    strength_min: f64,
    first_segment: usize,
) -> Option<Pivot> {
    if seg2.direction != seg1.direction.opposite() || seg3.direction != seg1.direction {
        return None;
    }

    let (high, low) = match seg1.direction {
        Direction::Up => (seg1.high.min(seg3.high), seg2.low),
        Direction::Down => (seg2.high, seg1.low.max(seg3.low)),
    };
    if high <= low {
        return None;
    }

    let center = (high + low) / 2.0;
    let strength = (high - low) / center;
    if strength < strength_min {
        return None;
    }

    let (start_idx, end_idx) = (seg1.start_idx, seg3.end_idx);
    let span = series.candles().get(start_idx..=end_idx)?;
    let volumes: Vec<f64> = span.iter().map(|c| c.volume).collect();
    let closes: Vec<f64> = span.iter().map(|c| c.close).collect();

    let volume_density = stats::mean(&volumes).unwrap_or(0.0);
    let return_std = stats::sample_std(&stats::pct_changes(&closes)).unwrap_or(0.0);
    let breakout_probability = (bank.mean_volume_ratio(start_idx, end_idx) * BREAKOUT_VOLUME_WEIGHT
        + return_std * BREAKOUT_VOLATILITY_SCALE * BREAKOUT_VOLATILITY_WEIGHT)
        .clamp(BREAKOUT_PROBABILITY_FLOOR, BREAKOUT_PROBABILITY_CAP);

    let direction_bias = if seg3.strength > seg1.strength {
        Direction::Up
    } else {
        Direction::Down
    };

    Some(Pivot {
        start_idx,
        end_idx,
        high,
        low,
        center,
        strength,
        volume_density,
        breakout_probability,
        direction_bias,
        first_segment,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IndicatorConfig;
    use crate::types::Candle;
    use chrono::NaiveDate;

    fn make_series(n: usize) -> Series {
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let candles = (0..n)
            .map(|i| {
                let p = 10.0 + (i % 5) as f64 * 0.5;
                Candle {
                    timestamp: (start + chrono::Duration::days(i as i64))
                        .and_hms_opt(0, 0, 0)
                        .unwrap(),
                    open: p,
                    high: p + 0.1,
                    low: p - 0.1,
                    close: p,
                    volume: 1000.0,
                    amount: None,
                }
            })
            .collect();
        Series::new("TEST", candles).unwrap()
    }

    fn make_segment(start: usize, end: usize, direction: Direction, high: f64, low: f64) -> Segment {
        let (start_price, end_price) = match direction {
            Direction::Up => (low, high),
            Direction::Down => (high, low),
        };
        Segment {
            start_idx: start,
            end_idx: end,
            direction,
            start_price,
            end_price,
            high,
            low,
            duration: end - start + 1,
            strength: (end_price - start_price).abs() / start_price,
            volume_profile: 1000.0,
        }
    }

    fn bank(series: &Series) -> IndicatorBank {
        IndicatorBank::compute(series, &IndicatorConfig::default()).unwrap()
    }

    #[test]
    fn test_up_down_up_bounds() {
        let series = make_series(40);
        let segments = vec![
            make_segment(0, 10, Direction::Up, 12.0, 10.0),
            make_segment(10, 20, Direction::Down, 12.0, 11.0),
            make_segment(20, 30, Direction::Up, 14.0, 11.0),
        ];
        let pivots = detect_pivots(&series, &segments, &bank(&series), 0.05);
        assert_eq!(pivots.len(), 1);
        let p = &pivots[0];
        assert_eq!((p.low, p.high, p.center), (11.0, 12.0, 11.5));
        assert_eq!((p.start_idx, p.end_idx, p.first_segment), (0, 30, 0));
        // rally out of the zone is stronger than the rally into it
        assert_eq!(p.direction_bias, Direction::Up);
        assert!(p.breakout_probability >= BREAKOUT_PROBABILITY_FLOOR);
        assert!(p.breakout_probability <= BREAKOUT_PROBABILITY_CAP);
    }

    #[test]
    fn test_down_up_down_bounds() {
        let series = make_series(40);
        let segments = vec![
            make_segment(0, 10, Direction::Down, 14.0, 10.0),
            make_segment(10, 20, Direction::Up, 12.0, 10.0),
            make_segment(20, 30, Direction::Down, 12.0, 10.5),
        ];
        let pivots = detect_pivots(&series, &segments, &bank(&series), 0.05);
        assert_eq!(pivots.len(), 1);
        assert_eq!((pivots[0].low, pivots[0].high), (10.5, 12.0));
        assert_eq!(pivots[0].direction_bias, Direction::Down);
    }

    #[test]
    fn test_degenerate_and_weak_zones_rejected() {
        let series = make_series(40);
        // pullback low above the lower rally high
        let inverted = vec![
            make_segment(0, 10, Direction::Up, 11.0, 10.0),
            make_segment(10, 20, Direction::Down, 12.0, 11.5),
            make_segment(20, 30, Direction::Up, 13.0, 11.5),
        ];
        assert!(detect_pivots(&series, &inverted, &bank(&series), 0.05).is_empty());

        // 2% wide zone under a 5% minimum
        let narrow = vec![
            make_segment(0, 10, Direction::Up, 12.0, 10.0),
            make_segment(10, 20, Direction::Down, 12.0, 11.76),
            make_segment(20, 30, Direction::Up, 13.0, 11.76),
        ];
        assert!(detect_pivots(&series, &narrow, &bank(&series), 0.05).is_empty());
    }

    #[test]
    fn test_non_alternating_triple_skipped() {
        let series = make_series(40);
        let segments = vec![
            make_segment(0, 10, Direction::Up, 12.0, 10.0),
            make_segment(10, 20, Direction::Up, 13.0, 11.0),
            make_segment(20, 30, Direction::Down, 13.0, 11.0),
        ];
        assert!(detect_pivots(&series, &segments, &bank(&series), 0.0).is_empty());
    }

    #[test]
    fn test_recent() {
        let series = make_series(60);
        let segments: Vec<Segment> = (0..5)
            .map(|i| {
                let dir = if i % 2 == 0 { Direction::Up } else { Direction::Down };
                make_segment(i * 10, i * 10 + 10, dir, 12.0, 10.0)
            })
            .collect();
        let pivots = detect_pivots(&series, &segments, &bank(&series), 0.05);
        assert_eq!(pivots.len(), 3);
        assert_eq!(recent(&pivots, 2)[0].first_segment, 1);
        assert_eq!(recent(&pivots, 10).len(), 3);
        assert!(recent(&pivots, 0).is_empty());
    }
}
