//! Segment construction from fractal points

use crate::types::{Direction, FractalKind, FractalPoint, Segment, Series};

/// Link alternating fractal points into directed segments.
///
/// Consecutive points of the same kind do not form a segment; the later one
/// becomes the new anchor. Segments spanning fewer than `min_bars` candles
/// are discarded. When that leaves two same-direction segments adjacent the
/// newer one replaces the older, so the output alternates and still ends on
/// the most recent move.
pub fn build_segments(series: &Series, fractals: &[FractalPoint], min_bars: usize) -> Vec<Segment> {
    let Some((first, rest)) = fractals.split_first() else {
        return Vec::new();
    };

    let mut raw = Vec::new();
    let mut anchor = first;
    for point in rest {
        if point.kind != anchor.kind && point.index > anchor.index {
            if let Some(segment) = make_segment(series, anchor, point) {
                raw.push(segment);
            }
        }
        anchor = point;
    }

    let mut segments: Vec<Segment> = Vec::with_capacity(raw.len());
    for segment in raw.into_iter().filter(|s| s.duration >= min_bars) {
        match segments.last_mut() {
            Some(last) if last.direction == segment.direction => *last = segment,
            _ => segments.push(segment),
        }
    }
    segments
}

fn make_segment(series: &Series, from: &FractalPoint, to: &FractalPoint) -> Option<Segment> {
    let span = series.candles().get(from.index..=to.index)?;
    let direction = match from.kind {
        FractalKind::Low => Direction::Up,
        FractalKind::High => Direction::Down,
    };

    let high = span.iter().map(|c| c.high).fold(f64::MIN, f64::max);
    let low = span.iter().map(|c| c.low).fold(f64::MAX, f64::min);
    let volume_profile = span.iter().map(|c| c.volume).sum::<f64>() / span.len() as f64;
    let strength = if from.price > 0.0 {
        (to.price - from.price).abs() / from.price
    } else {
        0.0
    };

    Some(Segment {
        start_idx: from.index,
        end_idx: to.index,
        direction,
        start_price: from.price,
        end_price: to.price,
        high,
        low,
        duration: span.len(),
        strength,
        volume_profile,
    })
}
