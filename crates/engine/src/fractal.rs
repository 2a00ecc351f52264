//! Fractal point detection
//!
//! A candle is a high fractal when its high is strictly above every other
//! high within `half_width` candles on either side, and a low fractal when
//! its low is strictly below every other low in the same window. Ties
//! (plateaus) never qualify. An outside bar that qualifies both ways is
//! ambiguous and is skipped.

use crate::types::{FractalKind, FractalPoint, Series};

/// Detect fractal points in index order. Returns an empty list when the
/// series is shorter than `2 * half_width + 1` or `half_width` is zero.
pub fn detect_fractals(series: &Series, half_width: usize) -> Vec<FractalPoint> {
    let candles = series.candles();
    let w = half_width;
    let Some(span) = w.checked_mul(2).and_then(|x| x.checked_add(1)) else {
        return Vec::new();
    };
    if w == 0 || candles.len() < span {
        return Vec::new();
    }

    let mut points = Vec::new();
    for i in w..candles.len() - w {
        let neighbours = (i - w..=i + w).filter(|&j| j != i);
        let (mut is_high, mut is_low) = (true, true);
        for j in neighbours {
            is_high &= candles[i].high > candles[j].high;
            is_low &= candles[i].low < candles[j].low;
            if !is_high && !is_low {
                break;
            }
        }

        match (is_high, is_low) {
            (true, false) => points.push(FractalPoint {
                index: i,
                kind: FractalKind::High,
                price: candles[i].high,
            }),
            (false, true) => points.push(FractalPoint {
                index: i,
                kind: FractalKind::Low,
                price: candles[i].low,
            }),
            _ => {}
        }
    }
    points
}
