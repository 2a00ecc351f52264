//! Trend classification and buy signal detection

use crate::config::StructureConfig;
use crate::types::{Direction, Pivot, Segment, Signal, SignalKind, SignalOrigin, Trend};

/// Vote over the last `window` segments, confirmed by the close against its
/// short moving average. No segments or no average means `Side`.
pub fn classify_trend(segments: &[Segment], close: f64, trend_ma: Option<f64>, window: usize) -> Trend {
    let Some(ma) = trend_ma else {
        return Trend::Side;
    };
    let recent = &segments[segments.len().saturating_sub(window)..];
    let up = recent.iter().filter(|s| s.direction == Direction::Up).count();
    let down = recent.len() - up;

    if up > down && close > ma {
        Trend::Up
    } else if down > up && close < ma {
        Trend::Down
    } else {
        Trend::Side
    }
}

/// Exactly one signal per call, by priority: breakout above a recent pivot,
/// pullback into a recent up-biased pivot, then an up-segment reclaim.
pub fn detect_signal(
    close: f64,
    segments: &[Segment],
    pivots: &[Pivot],
    trend: Trend,
    config: &StructureConfig,
) -> Signal {
    let first_recent = pivots.len().saturating_sub(config.pivot_lookback);
    let newest_first = || pivots.iter().enumerate().skip(first_recent).rev();

    if let Some((idx, pivot)) =
        newest_first().find(|(_, p)| close > p.high * (1.0 + config.breakout_margin))
    {
        return Signal {
            kind: SignalKind::SecondBuy,
            price: close,
            confidence: pivot.breakout_probability.clamp(0.0, 1.0),
            origin: Some(SignalOrigin::Pivot(idx)),
        };
    }

    if let Some((idx, pivot)) = newest_first().find(|(_, p)| {
        p.direction_bias == Direction::Up && p.low <= close && close <= p.high
    }) {
        return Signal {
            kind: SignalKind::ThirdBuy,
            price: close,
            confidence: (pivot.breakout_probability * config.pullback_confidence_factor)
                .clamp(0.0, 1.0),
            origin: Some(SignalOrigin::Pivot(idx)),
        };
    }

    if let [.., prev, last] = segments {
        let reclaimed = close > last.start_price * (1.0 + config.reclaim_margin);
        if last.direction == Direction::Up
            && prev.direction == Direction::Down
            && trend == Trend::Up
            && reclaimed
        {
            return Signal {
                kind: SignalKind::TrendContinuation,
                price: close,
                confidence: config.continuation_confidence.clamp(0.0, 1.0),
                origin: Some(SignalOrigin::Segment(segments.len() - 1)),
            };
        }
    }

    Signal::none(close)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_segment(start: usize, direction: Direction, start_price: f64, end_price: f64) -> Segment {
        Segment {
            start_idx: start,
            end_idx: start + 6,
            direction,
            start_price,
            end_price,
            high: start_price.max(end_price),
            low: start_price.min(end_price),
            duration: 7,
            strength: (end_price - start_price).abs() / start_price,
            volume_profile: 1000.0,
        }
    }

    fn make_pivot(low: f64, high: f64, bias: Direction, probability: f64) -> Pivot {
        Pivot {
            start_idx: 0,
            end_idx: 20,
            high,
            low,
            center: (high + low) / 2.0,
            strength: (high - low) / ((high + low) / 2.0),
            volume_density: 1000.0,
            breakout_probability: probability,
            direction_bias: bias,
            first_segment: 0,
        }
    }

    fn zigzag() -> Vec<Segment> {
        vec![
            make_segment(0, Direction::Up, 10.0, 12.0),
            make_segment(6, Direction::Down, 12.0, 11.0),
            make_segment(12, Direction::Up, 11.0, 13.0),
        ]
    }

    #[test]
    fn test_trend_votes_and_ma_confirmation() {
        let segments = zigzag();
        assert_eq!(classify_trend(&segments, 13.0, Some(12.5), 3), Trend::Up);
        // votes say up but the close sits under its average
        assert_eq!(classify_trend(&segments, 12.0, Some(12.5), 3), Trend::Side);
        assert_eq!(classify_trend(&segments, 13.0, None, 3), Trend::Side);
        assert_eq!(classify_trend(&[], 13.0, Some(12.5), 3), Trend::Side);

        let down = vec![
            make_segment(0, Direction::Down, 13.0, 11.0),
            make_segment(6, Direction::Up, 11.0, 12.0),
            make_segment(12, Direction::Down, 12.0, 10.0),
        ];
        assert_eq!(classify_trend(&down, 10.0, Some(11.0), 3), Trend::Down);
    }

    #[test]
    fn test_breakout_beats_pullback() {
        let config = StructureConfig::default();
        let pivots = vec![
            make_pivot(11.0, 12.0, Direction::Up, 0.6),
            make_pivot(12.0, 13.5, Direction::Up, 0.5),
        ];
        // inside the newer pivot, above the older one by more than 2%
        let signal = detect_signal(12.5, &[], &pivots, Trend::Side, &config);
        assert_eq!(signal.kind, SignalKind::SecondBuy);
        assert_eq!(signal.origin, Some(SignalOrigin::Pivot(0)));
        assert_eq!(signal.confidence, 0.6);
    }

    #[test]
    fn test_breakout_respects_margin() {
        let pivots = vec![make_pivot(11.0, 12.0, Direction::Down, 0.5)];
        let strict = StructureConfig::default();
        // 12.2 is under 12 x 1.02
        let signal = detect_signal(12.2, &[], &pivots, Trend::Side, &strict);
        assert_eq!(signal.kind, SignalKind::NoSignal);

        let relaxed = StructureConfig {
            breakout_margin: 0.0,
            ..StructureConfig::default()
        };
        let signal = detect_signal(12.2, &[], &pivots, Trend::Side, &relaxed);
        assert_eq!(signal.kind, SignalKind::SecondBuy);
    }

    #[test]
    fn test_pullback_needs_up_bias() {
        let config = StructureConfig::default();
        let up = vec![make_pivot(11.0, 12.0, Direction::Up, 0.5)];
        let signal = detect_signal(11.5, &[], &up, Trend::Side, &config);
        assert_eq!(signal.kind, SignalKind::ThirdBuy);
        assert!((signal.confidence - 0.4).abs() < 1e-12);

        let down = vec![make_pivot(11.0, 12.0, Direction::Down, 0.5)];
        let signal = detect_signal(11.5, &[], &down, Trend::Side, &config);
        assert_eq!(signal.kind, SignalKind::NoSignal);
        assert_eq!(signal.confidence, 0.0);
    }

    #[test]
    fn test_only_recent_pivots_are_checked() {
        let config = StructureConfig::default();
        let pivots = vec![
            make_pivot(5.0, 6.0, Direction::Up, 0.9),
            make_pivot(20.0, 22.0, Direction::Down, 0.5),
            make_pivot(20.0, 23.0, Direction::Down, 0.5),
        ];
        let signal = detect_signal(10.0, &[], &pivots, Trend::Side, &config);
        assert_eq!(signal.kind, SignalKind::NoSignal);
    }

    #[test]
    fn test_trend_continuation() {
        let config = StructureConfig::default();
        let segments = zigzag();
        let signal = detect_signal(13.0, &segments, &[], Trend::Up, &config);
        assert_eq!(signal.kind, SignalKind::TrendContinuation);
        assert_eq!(signal.origin, Some(SignalOrigin::Segment(2)));
        assert_eq!(signal.confidence, 0.7);

        // not confirmed by trend
        let signal = detect_signal(13.0, &segments, &[], Trend::Side, &config);
        assert_eq!(signal.kind, SignalKind::NoSignal);
        // close has not reclaimed the segment start by 1%
        let signal = detect_signal(11.05, &segments, &[], Trend::Up, &config);
        assert_eq!(signal.kind, SignalKind::NoSignal);
    }
}
