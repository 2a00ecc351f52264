//! Chan structure screening engine
//!
//! Derives structural signals (fractals, segments, consolidation pivots,
//! breakouts) from daily OHLCV series and fuses them with volume, momentum,
//! volatility and optional auction factors into a gated buy recommendation.
//! Provides:
//! - Candle normalization and an indicator bank
//! - Fractal, segment and pivot detection with trend and signal classification
//! - Uptrend, leader and volume confirmations
//! - Multi-factor scoring with entry/stop/target levels and position sizing
//! - Pre-market auction assessment
//! - An illustrative walk-forward backtest

pub mod auction;
pub mod backtest;
pub mod config;
pub mod confirm;
pub mod error;
pub mod fractal;
pub mod indicators;
pub mod normalize;
pub mod pivot;
pub mod presets;
pub mod risk;
pub mod scoring;
pub mod screener;
pub mod segment;
pub mod signal;
pub mod stats;
pub mod structure;
pub mod types;

// Re-exports for convenience
pub use auction::{assess, classify_gap, AuctionAssessment, AuctionTape, OpeningPlan};
pub use backtest::{
    walk_forward, BacktestConfig, BacktestEngine, BacktestResult, EventReason, TradeAction,
    TradeEvent,
};
pub use config::{
    EngineConfig, FactorWeights, IndicatorConfig, LeaderConfig, RiskConfig, ScoringConfig,
    SelectionConfig, StructureConfig, TierThresholds, UptrendConfig, VolumeConfirmationConfig,
};
pub use confirm::{Confirmation, LeaderStrength, VolumeStats};
pub use error::{EngineError, EngineResult};
pub use fractal::detect_fractals;
pub use indicators::{IndicatorBank, IndicatorSnapshot, MacdPoint};
pub use normalize::{normalize, RawRow, RawValue};
pub use pivot::detect_pivots;
pub use presets::Preset;
pub use risk::{position_size, trade_levels, TradeLevels};
pub use screener::{rank, Analysis, Screener};
pub use segment::build_segments;
pub use signal::{classify_trend, detect_signal};
pub use structure::{analyze, Structure};
pub use types::*;
