//! Full structural analysis of one series: fractals, segments, pivots,
//! trend and the resulting signal.

use serde::Serialize;
use tracing::debug;

use crate::config::StructureConfig;
use crate::fractal::detect_fractals;
use crate::indicators::IndicatorBank;
use crate::pivot::{self, detect_pivots};
use crate::segment::build_segments;
use crate::signal::{classify_trend, detect_signal};
use crate::types::{FractalPoint, Pivot, Segment, Series, Signal, Trend};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Structure {
    pub fractals: Vec<FractalPoint>,
    pub segments: Vec<Segment>,
    pub pivots: Vec<Pivot>,
    pub trend: Trend,
    pub signal: Signal,
}

impl Structure {
    /// Empty structure with a sideways trend and no signal
    pub fn neutral(close: f64) -> Self {
        Self {
            fractals: Vec::new(),
            segments: Vec::new(),
            pivots: Vec::new(),
            trend: Trend::Side,
            signal: Signal::none(close),
        }
    }

    pub fn latest_pivot(&self) -> Option<&Pivot> {
        self.pivots.last()
    }

    pub fn recent_pivots(&self, n: usize) -> &[Pivot] {
        pivot::recent(&self.pivots, n)
    }
}

/// Run every structural stage in order. Series shorter than
/// `config.min_candles` get the neutral structure.
pub fn analyze(series: &Series, bank: &IndicatorBank, config: &StructureConfig) -> Structure {
    let Some(last) = series.last() else {
        return Structure::neutral(0.0);
    };
    let close = last.close;
    if series.len() < config.min_candles {
        return Structure::neutral(close);
    }

    let fractals = detect_fractals(series, config.fractal_half_width);
    let segments = build_segments(series, &fractals, config.min_segment_bars);
    let pivots = detect_pivots(series, &segments, bank, config.pivot_strength_min);

    let trend_ma = bank.ma(config.trend_ma_window, series.len() - 1);
    let trend = classify_trend(&segments, close, trend_ma, config.trend_segments);
    let signal = detect_signal(close, &segments, &pivots, trend, config);

    debug!(
        symbol = series.symbol(),
        fractals = fractals.len(),
        segments = segments.len(),
        pivots = pivots.len(),
        %trend,
        signal = %signal.kind,
        "Structure analyzed"
    );

    Structure {
        fractals,
        segments,
        pivots,
        trend,
        signal,
    }
}
