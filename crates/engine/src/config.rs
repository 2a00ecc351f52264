//! Engine configuration
//!
//! One immutable `EngineConfig` is handed to the screener at construction.
//! Every threshold used anywhere in the pipeline lives here, backed by a
//! named default constant, so per-call overrides and concurrent use across
//! symbols never touch shared state.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

// ============================================================================
// Defaults
// ============================================================================

pub const DEFAULT_MA_WINDOWS: [usize; 4] = [5, 10, 20, 34];
pub const DEFAULT_RSI_PERIOD: usize = 14;
pub const DEFAULT_MACD_FAST: usize = 12;
pub const DEFAULT_MACD_SLOW: usize = 26;
pub const DEFAULT_MACD_SIGNAL: usize = 9;
pub const DEFAULT_VOLUME_WINDOW: usize = 20;
pub const DEFAULT_MOMENTUM_PERIODS: [usize; 2] = [5, 10];
pub const DEFAULT_VOLATILITY_WINDOW: usize = 20;
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

pub const DEFAULT_MIN_CANDLES: usize = 10;
pub const DEFAULT_FRACTAL_HALF_WIDTH: usize = 2;
pub const DEFAULT_MIN_SEGMENT_BARS: usize = 5;
pub const DEFAULT_PIVOT_STRENGTH_MIN: f64 = 0.05;
pub const DEFAULT_PIVOT_LOOKBACK: usize = 2;
pub const DEFAULT_BREAKOUT_MARGIN: f64 = 0.02;
pub const DEFAULT_RECLAIM_MARGIN: f64 = 0.01;
pub const DEFAULT_TREND_SEGMENTS: usize = 3;
pub const DEFAULT_TREND_MA_WINDOW: usize = 5;
pub const DEFAULT_PULLBACK_CONFIDENCE_FACTOR: f64 = 0.8;
pub const DEFAULT_CONTINUATION_CONFIDENCE: f64 = 0.7;

pub const DEFAULT_TECHNICAL_WEIGHT: f64 = 0.32;
pub const DEFAULT_VOLUME_WEIGHT: f64 = 0.20;
pub const DEFAULT_MOMENTUM_WEIGHT: f64 = 0.16;
pub const DEFAULT_VOLATILITY_WEIGHT: f64 = 0.12;
pub const DEFAULT_AUCTION_WEIGHT: f64 = 0.20;
pub const DEFAULT_MIN_SCORE: f64 = 0.65;
pub const DEFAULT_TIER_MEDIUM: f64 = 0.65;
pub const DEFAULT_TIER_HIGH: f64 = 0.75;
pub const DEFAULT_TIER_VERY_HIGH: f64 = 0.85;
pub const DEFAULT_ALIGNMENT_WINDOWS: [usize; 3] = [5, 10, 20];
pub const DEFAULT_SCORE_WINDOW: usize = 20;
pub const DEFAULT_MOMENTUM_SCORE_PERIOD: usize = 10;

pub const DEFAULT_STOP_LOSS_PCT: f64 = 0.08;
pub const DEFAULT_PIVOT_STOP_BUFFER: f64 = 0.98;
pub const DEFAULT_REWARD_MULTIPLE: f64 = 3.0;
pub const DEFAULT_MAX_ACCOUNT_RISK: f64 = 0.02;
pub const DEFAULT_MAX_POSITION_PCT: f64 = 0.10;

pub const DEFAULT_MIN_HISTORY: usize = 60;
pub const DEFAULT_MIN_PRICE: f64 = 3.0;
pub const DEFAULT_MAX_PRICE: f64 = 300.0;
pub const DEFAULT_MAX_VOLATILITY: f64 = 0.8;
pub const DEFAULT_LIQUIDITY_WINDOW: usize = 20;

pub const DEFAULT_UPTREND_MA_WINDOW: usize = 34;
pub const DEFAULT_UPTREND_CROSS_RATIO: f64 = 1.02;
pub const DEFAULT_MACD_THRESHOLD: f64 = 0.0;

pub const DEFAULT_STRENGTH_DAYS: usize = 10;
pub const DEFAULT_LEADER_RETURN_PCT: f64 = 5.0;
pub const DEFAULT_LEADER_VOLUME_ACTIVITY: f64 = 1.5;
pub const DEFAULT_BREAKAWAY_RETURN_PCT: f64 = 10.0;
pub const DEFAULT_ACTIVITY_RECENT: usize = 5;
pub const DEFAULT_ACTIVITY_PRIOR: usize = 10;

pub const DEFAULT_VOLUME_MA_PERIOD: usize = 5;
pub const DEFAULT_BREAKOUT_VOLUME_MIN: f64 = 1.8;
pub const DEFAULT_PULLBACK_VOLUME_MAX: f64 = 0.5;
pub const DEFAULT_PULLBACK_RECENT: usize = 3;
pub const DEFAULT_PULLBACK_PRIOR: usize = 5;

/// Upper bound on `fractal_half_width`
pub const MAX_FRACTAL_HALF_WIDTH: usize = 50;
/// Upper bound on every indicator window and lookback (about four years of
/// daily candles)
pub const MAX_INDICATOR_WINDOW: usize = 1_000;

/// Tolerance for the weight-sum invariant
pub const WEIGHT_SUM_TOLERANCE: f64 = 1e-6;

// ============================================================================
// Sections
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    /// Simple moving average windows computed for every candle
    pub ma_windows: Vec<usize>,
    pub rsi_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    /// Rolling window for the volume ratio denominator
    pub volume_window: usize,
    /// Lookbacks `k` for `close[t] / close[t-k] - 1`
    pub momentum_periods: Vec<usize>,
    /// Rolling window for return volatility
    pub volatility_window: usize,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            ma_windows: DEFAULT_MA_WINDOWS.to_vec(),
            rsi_period: DEFAULT_RSI_PERIOD,
            macd_fast: DEFAULT_MACD_FAST,
            macd_slow: DEFAULT_MACD_SLOW,
            macd_signal: DEFAULT_MACD_SIGNAL,
            volume_window: DEFAULT_VOLUME_WINDOW,
            momentum_periods: DEFAULT_MOMENTUM_PERIODS.to_vec(),
            volatility_window: DEFAULT_VOLATILITY_WINDOW,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructureConfig {
    /// Below this many candles the structural analysis is neutral
    pub min_candles: usize,
    /// Candles required on each side of a fractal
    pub fractal_half_width: usize,
    /// Segments spanning fewer candles are discarded
    pub min_segment_bars: usize,
    /// Minimum `(high - low) / center` for a pivot
    pub pivot_strength_min: f64,
    /// How many of the most recent pivots the signal detector inspects
    pub pivot_lookback: usize,
    /// Required excess above the pivot high for a breakout (0.02 = 2%)
    pub breakout_margin: f64,
    /// Required excess above the last segment start for a continuation
    pub reclaim_margin: f64,
    /// Number of trailing segments voted on by the trend classifier
    pub trend_segments: usize,
    /// Moving average the close is compared against for trend
    pub trend_ma_window: usize,
    /// Pullback confidence = breakout probability x this factor
    pub pullback_confidence_factor: f64,
    pub continuation_confidence: f64,
}

impl Default for StructureConfig {
    fn default() -> Self {
        Self {
            min_candles: DEFAULT_MIN_CANDLES,
            fractal_half_width: DEFAULT_FRACTAL_HALF_WIDTH,
            min_segment_bars: DEFAULT_MIN_SEGMENT_BARS,
            pivot_strength_min: DEFAULT_PIVOT_STRENGTH_MIN,
            pivot_lookback: DEFAULT_PIVOT_LOOKBACK,
            breakout_margin: DEFAULT_BREAKOUT_MARGIN,
            reclaim_margin: DEFAULT_RECLAIM_MARGIN,
            trend_segments: DEFAULT_TREND_SEGMENTS,
            trend_ma_window: DEFAULT_TREND_MA_WINDOW,
            pullback_confidence_factor: DEFAULT_PULLBACK_CONFIDENCE_FACTOR,
            continuation_confidence: DEFAULT_CONTINUATION_CONFIDENCE,
        }
    }
}

/// Factor weight vector. Must sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FactorWeights {
    pub technical: f64,
    pub volume: f64,
    pub momentum: f64,
    pub volatility: f64,
    pub auction: f64,
}

impl Default for FactorWeights {
    fn default() -> Self {
        Self {
            technical: DEFAULT_TECHNICAL_WEIGHT,
            volume: DEFAULT_VOLUME_WEIGHT,
            momentum: DEFAULT_MOMENTUM_WEIGHT,
            volatility: DEFAULT_VOLATILITY_WEIGHT,
            auction: DEFAULT_AUCTION_WEIGHT,
        }
    }
}

impl FactorWeights {
    pub fn sum(&self) -> f64 {
        self.technical + self.volume + self.momentum + self.volatility + self.auction
    }

    /// Weights to apply for one scoring call. Without an auction factor the
    /// auction share is dropped and the rest re-normalized to 1.0.
    pub fn effective(&self, auction_present: bool) -> FactorWeights {
        if auction_present {
            return *self;
        }
        let rest = self.technical + self.volume + self.momentum + self.volatility;
        if rest <= 0.0 {
            return FactorWeights {
                technical: 0.25,
                volume: 0.25,
                momentum: 0.25,
                volatility: 0.25,
                auction: 0.0,
            };
        }
        FactorWeights {
            technical: self.technical / rest,
            volume: self.volume / rest,
            momentum: self.momentum / rest,
            volatility: self.volatility / rest,
            auction: 0.0,
        }
    }

    pub fn validate(&self) -> EngineResult<()> {
        let all = [
            self.technical,
            self.volume,
            self.momentum,
            self.volatility,
            self.auction,
        ];
        if all.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(EngineError::InvalidConfig(
                "factor weights must be finite and non-negative".to_string(),
            ));
        }
        if (self.sum() - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            return Err(EngineError::InvalidConfig(format!(
                "factor weights sum to {:.6}, expected 1.0",
                self.sum()
            )));
        }
        Ok(())
    }
}

/// Lower score bounds of each confidence tier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierThresholds {
    pub medium: f64,
    pub high: f64,
    /// Scores strictly above this are `very_high`
    pub very_high: f64,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            medium: DEFAULT_TIER_MEDIUM,
            high: DEFAULT_TIER_HIGH,
            very_high: DEFAULT_TIER_VERY_HIGH,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub weights: FactorWeights,
    /// Totals below this are suppressed
    pub min_score: f64,
    pub tiers: TierThresholds,
    /// Suppress symbols whose signal is `no_signal`
    pub require_signal: bool,
    /// Short/mid/long MA windows for the alignment check
    pub alignment_windows: [usize; 3],
    /// Trailing candles examined by the volume and momentum factors
    pub score_window: usize,
    /// Momentum lookback used by the momentum factor
    pub momentum_score_period: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            weights: FactorWeights::default(),
            min_score: DEFAULT_MIN_SCORE,
            tiers: TierThresholds::default(),
            require_signal: true,
            alignment_windows: DEFAULT_ALIGNMENT_WINDOWS,
            score_window: DEFAULT_SCORE_WINDOW,
            momentum_score_period: DEFAULT_MOMENTUM_SCORE_PERIOD,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Flat stop distance below entry (0.08 = 8%)
    pub stop_loss_pct: f64,
    /// Pivot-based stop = latest pivot low x this buffer
    pub pivot_stop_buffer: f64,
    /// Target = entry + (entry - stop) x this multiple
    pub reward_multiple: f64,
    /// Largest share of equity lost if a stop is hit
    pub max_account_risk: f64,
    /// Largest share of equity in one position
    pub max_position_pct: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            stop_loss_pct: DEFAULT_STOP_LOSS_PCT,
            pivot_stop_buffer: DEFAULT_PIVOT_STOP_BUFFER,
            reward_multiple: DEFAULT_REWARD_MULTIPLE,
            max_account_risk: DEFAULT_MAX_ACCOUNT_RISK,
            max_position_pct: DEFAULT_MAX_POSITION_PCT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Candles required before a symbol is scored at all
    pub min_history: usize,
    pub min_price: f64,
    pub max_price: f64,
    /// Maximum annualized return volatility
    pub max_volatility: f64,
    /// Minimum average traded amount over `liquidity_window`, if set
    pub min_avg_amount: Option<f64>,
    pub liquidity_window: usize,
    pub uptrend: UptrendConfig,
    pub leader: LeaderConfig,
    pub volume_confirmation: VolumeConfirmationConfig,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            min_history: DEFAULT_MIN_HISTORY,
            min_price: DEFAULT_MIN_PRICE,
            max_price: DEFAULT_MAX_PRICE,
            max_volatility: DEFAULT_MAX_VOLATILITY,
            min_avg_amount: None,
            liquidity_window: DEFAULT_LIQUIDITY_WINDOW,
            uptrend: UptrendConfig::default(),
            leader: LeaderConfig::default(),
            volume_confirmation: VolumeConfirmationConfig::default(),
        }
    }
}

/// Daily uptrend gate: the close clears the latest pivot by `cross_ratio`
/// while holding the `ma_window` average, or MACD is above `macd_threshold`
/// while the structural trend is up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UptrendConfig {
    pub enabled: bool,
    pub ma_window: usize,
    pub cross_ratio: f64,
    pub macd_threshold: f64,
}

impl Default for UptrendConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ma_window: DEFAULT_UPTREND_MA_WINDOW,
            cross_ratio: DEFAULT_UPTREND_CROSS_RATIO,
            macd_threshold: DEFAULT_MACD_THRESHOLD,
        }
    }
}

/// Relative strength filter for market leaders
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeaderConfig {
    pub enabled: bool,
    /// Candles spanned by the price strength return
    pub strength_days: usize,
    /// Return (percent) that qualifies together with rising activity
    pub return_pct: f64,
    /// Recent-over-prior mean volume that counts as rising activity
    pub volume_activity: f64,
    /// Return (percent) that qualifies on its own
    pub breakaway_return_pct: f64,
    pub activity_recent: usize,
    pub activity_prior: usize,
}

impl Default for LeaderConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            strength_days: DEFAULT_STRENGTH_DAYS,
            return_pct: DEFAULT_LEADER_RETURN_PCT,
            volume_activity: DEFAULT_LEADER_VOLUME_ACTIVITY,
            breakaway_return_pct: DEFAULT_BREAKAWAY_RETURN_PCT,
            activity_recent: DEFAULT_ACTIVITY_RECENT,
            activity_prior: DEFAULT_ACTIVITY_PRIOR,
        }
    }
}

/// Volume behind the entry signal. Breakouts and continuations need the
/// last candle's volume at `breakout_min` times its recent average; pullbacks
/// need the last `pullback_recent` candles at most `pullback_max` of the
/// `pullback_prior` before them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeConfirmationConfig {
    pub enabled: bool,
    pub ma_period: usize,
    pub breakout_min: f64,
    pub pullback_max: f64,
    pub pullback_recent: usize,
    pub pullback_prior: usize,
}

impl Default for VolumeConfirmationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ma_period: DEFAULT_VOLUME_MA_PERIOD,
            breakout_min: DEFAULT_BREAKOUT_VOLUME_MIN,
            pullback_max: DEFAULT_PULLBACK_VOLUME_MAX,
            pullback_recent: DEFAULT_PULLBACK_RECENT,
            pullback_prior: DEFAULT_PULLBACK_PRIOR,
        }
    }
}

// ============================================================================
// Root
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub indicators: IndicatorConfig,
    pub structure: StructureConfig,
    pub scoring: ScoringConfig,
    pub risk: RiskConfig,
    pub selection: SelectionConfig,
}

impl EngineConfig {
    /// Check internal consistency. `Screener::new` refuses invalid configs.
    pub fn validate(&self) -> EngineResult<()> {
        let ind = &self.indicators;
        let windows = [
            ("rsi_period", ind.rsi_period),
            ("macd_fast", ind.macd_fast),
            ("macd_slow", ind.macd_slow),
            ("macd_signal", ind.macd_signal),
            ("volume_window", ind.volume_window),
            ("volatility_window", ind.volatility_window),
            ("fractal_half_width", self.structure.fractal_half_width),
            ("min_segment_bars", self.structure.min_segment_bars),
            ("pivot_lookback", self.structure.pivot_lookback),
            ("trend_segments", self.structure.trend_segments),
            ("trend_ma_window", self.structure.trend_ma_window),
            ("score_window", self.scoring.score_window),
            ("liquidity_window", self.selection.liquidity_window),
            ("uptrend.ma_window", self.selection.uptrend.ma_window),
            ("leader.strength_days", self.selection.leader.strength_days),
            ("leader.activity_recent", self.selection.leader.activity_recent),
            ("leader.activity_prior", self.selection.leader.activity_prior),
            ("volume_confirmation.ma_period", self.selection.volume_confirmation.ma_period),
            ("volume_confirmation.pullback_recent", self.selection.volume_confirmation.pullback_recent),
            ("volume_confirmation.pullback_prior", self.selection.volume_confirmation.pullback_prior),
        ];
        for (name, value) in windows {
            if value == 0 {
                return Err(EngineError::InvalidConfig(format!("{name} must be > 0")));
            }
        }
        if ind.ma_windows.iter().any(|w| *w == 0) || ind.momentum_periods.iter().any(|p| *p == 0) {
            return Err(EngineError::InvalidConfig(
                "moving average and momentum windows must be > 0".to_string(),
            ));
        }
        let mut indicator_windows = windows
            .iter()
            .filter(|(name, _)| *name != "fractal_half_width")
            .map(|(_, value)| *value)
            .chain(ind.ma_windows.iter().copied())
            .chain(ind.momentum_periods.iter().copied());
        if let Some(w) = indicator_windows.find(|w| *w > MAX_INDICATOR_WINDOW) {
            return Err(EngineError::InvalidConfig(format!(
                "window {w} exceeds the maximum of {MAX_INDICATOR_WINDOW}"
            )));
        }
        if self.structure.fractal_half_width > MAX_FRACTAL_HALF_WIDTH {
            return Err(EngineError::InvalidConfig(format!(
                "fractal_half_width must be <= {MAX_FRACTAL_HALF_WIDTH}"
            )));
        }
        if ind.macd_fast >= ind.macd_slow {
            return Err(EngineError::InvalidConfig(
                "macd_fast must be shorter than macd_slow".to_string(),
            ));
        }

        let mut required_ma = self.scoring.alignment_windows.to_vec();
        required_ma.push(self.structure.trend_ma_window);
        if self.selection.uptrend.enabled {
            required_ma.push(self.selection.uptrend.ma_window);
        }
        if let Some(missing) = required_ma.iter().find(|w| !ind.ma_windows.contains(w)) {
            return Err(EngineError::InvalidConfig(format!(
                "moving average window {missing} is required but not in ma_windows"
            )));
        }
        if !ind
            .momentum_periods
            .contains(&self.scoring.momentum_score_period)
        {
            return Err(EngineError::InvalidConfig(format!(
                "momentum period {} is required but not in momentum_periods",
                self.scoring.momentum_score_period
            )));
        }

        self.scoring.weights.validate()?;

        let tiers = &self.scoring.tiers;
        if !(tiers.medium <= tiers.high && tiers.high <= tiers.very_high) {
            return Err(EngineError::InvalidConfig(
                "tier thresholds must be ascending".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.scoring.min_score) {
            return Err(EngineError::InvalidConfig(
                "min_score must lie in [0, 1]".to_string(),
            ));
        }

        let fractions = [
            ("pivot_strength_min", self.structure.pivot_strength_min),
            ("breakout_margin", self.structure.breakout_margin),
            ("reclaim_margin", self.structure.reclaim_margin),
            ("stop_loss_pct", self.risk.stop_loss_pct),
            ("max_account_risk", self.risk.max_account_risk),
            ("max_position_pct", self.risk.max_position_pct),
        ];
        for (name, value) in fractions {
            if !(0.0..1.0).contains(&value) {
                return Err(EngineError::InvalidConfig(format!(
                    "{name} must lie in [0, 1)"
                )));
            }
        }
        if self.risk.reward_multiple <= 0.0 || self.risk.pivot_stop_buffer <= 0.0 {
            return Err(EngineError::InvalidConfig(
                "reward_multiple and pivot_stop_buffer must be positive".to_string(),
            ));
        }
        let vc = &self.selection.volume_confirmation;
        if vc.breakout_min <= 0.0 || vc.pullback_max <= 0.0 || self.selection.uptrend.cross_ratio <= 0.0 {
            return Err(EngineError::InvalidConfig(
                "volume confirmation bounds and uptrend cross_ratio must be positive".to_string(),
            ));
        }
        if self.selection.min_price > self.selection.max_price {
            return Err(EngineError::InvalidConfig(
                "min_price exceeds max_price".to_string(),
            ));
        }
        Ok(())
    }

    /// Candles needed before any scoring happens
    pub fn required_history(&self) -> usize {
        self.selection
            .min_history
            .max(self.structure.min_candles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        EngineConfig::default().validate().unwrap();
    }

    #[test]
    fn test_default_weights_sum_to_one() {
        let weights = FactorWeights::default();
        assert!((weights.sum() - 1.0).abs() < WEIGHT_SUM_TOLERANCE);
    }

    #[test]
    fn test_effective_weights_renormalize_without_auction() {
        let weights = FactorWeights::default();
        let without = weights.effective(false);
        assert_eq!(without.auction, 0.0);
        assert!((without.sum() - 1.0).abs() < WEIGHT_SUM_TOLERANCE);
        assert!((without.technical - 0.40).abs() < 1e-9);
        assert!((without.volatility - 0.15).abs() < 1e-9);

        let with = weights.effective(true);
        assert!((with.sum() - 1.0).abs() < WEIGHT_SUM_TOLERANCE);
        assert_eq!(with, weights);
    }

    #[test]
    fn test_bad_weight_sum_rejected() {
        let mut config = EngineConfig::default();
        config.scoring.weights.technical = 0.5;
        assert!(matches!(
            config.validate(),
            Err(EngineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_missing_alignment_window_rejected() {
        let mut config = EngineConfig::default();
        config.indicators.ma_windows = vec![5, 20];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_window_rejected() {
        let mut config = EngineConfig::default();
        config.structure.fractal_half_width = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_oversized_windows_rejected() {
        let mut config = EngineConfig::default();
        config.structure.fractal_half_width = usize::MAX;
        assert!(matches!(
            config.validate(),
            Err(EngineError::InvalidConfig(_))
        ));

        let mut config = EngineConfig::default();
        config.structure.fractal_half_width = MAX_FRACTAL_HALF_WIDTH;
        config.validate().unwrap();

        let mut config = EngineConfig::default();
        config.indicators.volume_window = usize::MAX;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.indicators.ma_windows.push(MAX_INDICATOR_WINDOW + 1);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_uptrend_requires_its_moving_average() {
        let mut config = EngineConfig::default();
        config.selection.uptrend.enabled = true;
        config.validate().unwrap();

        config.selection.uptrend.ma_window = 60;
        assert!(config.validate().is_err());

        config.selection.uptrend.enabled = false;
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_json_override() {
        let json = r#"{ "structure": { "breakout_margin": 0.0 }, "scoring": { "min_score": 0.7 } }"#;
        let config: EngineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.structure.breakout_margin, 0.0);
        assert_eq!(config.structure.min_segment_bars, DEFAULT_MIN_SEGMENT_BARS);
        assert_eq!(config.scoring.min_score, 0.7);
        assert_eq!(config.scoring.weights, FactorWeights::default());
        config.validate().unwrap();
    }
}
