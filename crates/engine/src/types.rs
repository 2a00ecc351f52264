//! Core data types shared by every stage of the screening pipeline

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

// ============================================================================
// Candles
// ============================================================================

/// A single daily candlestick (OHLCV)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    /// Traded amount (turnover), when the source provides it
    pub amount: Option<f64>,
}

impl Candle {
    fn check(&self) -> Result<(), String> {
        let fields = [self.open, self.high, self.low, self.close, self.volume];
        if fields.iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(format!("non-finite or negative field at {}", self.timestamp));
        }
        if self.high < self.low {
            return Err(format!("high below low at {}", self.timestamp));
        }
        let within = |v: f64| v >= self.low && v <= self.high;
        if !within(self.open) || !within(self.close) {
            return Err(format!("open/close outside range at {}", self.timestamp));
        }
        Ok(())
    }
}

/// Time-ordered candles for one symbol. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    symbol: String,
    candles: Vec<Candle>,
    /// Raw rows discarded during normalization
    dropped_rows: usize,
}

impl Series {
    /// Build a series from already-clean candles, checking every invariant.
    pub fn new(symbol: impl Into<String>, candles: Vec<Candle>) -> EngineResult<Self> {
        for candle in &candles {
            candle.check().map_err(EngineError::MalformedInput)?;
        }
        if candles.windows(2).any(|w| w[1].timestamp <= w[0].timestamp) {
            return Err(EngineError::MalformedInput(
                "timestamps must be strictly increasing".to_string(),
            ));
        }
        Ok(Self {
            symbol: symbol.into(),
            candles,
            dropped_rows: 0,
        })
    }

    /// The normalizer has already enforced the invariants.
    pub(crate) fn from_clean(symbol: String, candles: Vec<Candle>, dropped_rows: usize) -> Self {
        Self {
            symbol,
            candles,
            dropped_rows,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn dropped_rows(&self) -> usize {
        self.dropped_rows
    }

    pub fn closes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.close).collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.candles.iter().map(|c| c.volume).collect()
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    /// Series truncated to the first `len` candles (used by walk-forward replay)
    pub fn prefix(&self, len: usize) -> Series {
        Series {
            symbol: self.symbol.clone(),
            candles: self.candles[..len.min(self.candles.len())].to_vec(),
            dropped_rows: self.dropped_rows,
        }
    }
}

// ============================================================================
// Structural primitives
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FractalKind {
    High,
    Low,
}

/// A local extremum over a symmetric window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FractalPoint {
    pub index: usize,
    pub kind: FractalKind,
    /// `high` of the candle for a high fractal, `low` for a low fractal
    pub price: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
        }
    }
}

/// A directed move between two alternating fractal points
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub start_idx: usize,
    pub end_idx: usize,
    pub direction: Direction,
    pub start_price: f64,
    pub end_price: f64,
    /// Highest high of the spanned candles
    pub high: f64,
    /// Lowest low of the spanned candles
    pub low: f64,
    /// Candle count, both ends inclusive
    pub duration: usize,
    /// Relative price change `|end - start| / start`
    pub strength: f64,
    /// Mean volume across the span
    pub volume_profile: f64,
}

/// A consolidation zone built from three alternating segments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pivot {
    pub start_idx: usize,
    pub end_idx: usize,
    pub high: f64,
    pub low: f64,
    pub center: f64,
    /// `(high - low) / center`
    pub strength: f64,
    /// Mean volume across the three-segment span
    pub volume_density: f64,
    /// Heuristic probability in [0, 1]
    pub breakout_probability: f64,
    pub direction_bias: Direction,
    /// Index of the first of the three segments that formed this pivot
    pub first_segment: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Side,
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trend::Up => write!(f, "up"),
            Trend::Down => write!(f, "down"),
            Trend::Side => write!(f, "side"),
        }
    }
}

// ============================================================================
// Signals
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    /// Close broke above a pivot's upper bound
    SecondBuy,
    /// Close pulled back into a pivot with an upward bias
    ThirdBuy,
    /// Close reclaimed the start of the latest up segment after a pullback
    TrendContinuation,
    NoSignal,
}

impl SignalKind {
    pub fn is_buy(self) -> bool {
        !matches!(self, SignalKind::NoSignal)
    }
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalKind::SecondBuy => write!(f, "second_buy"),
            SignalKind::ThirdBuy => write!(f, "third_buy"),
            SignalKind::TrendContinuation => write!(f, "trend_continuation"),
            SignalKind::NoSignal => write!(f, "no_signal"),
        }
    }
}

/// The structure that produced a signal, as an index into the analysis lists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "index")]
pub enum SignalOrigin {
    Pivot(usize),
    Segment(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub kind: SignalKind,
    pub price: f64,
    /// Confidence in [0, 1]
    pub confidence: f64,
    pub origin: Option<SignalOrigin>,
}

impl Signal {
    pub fn none(price: f64) -> Self {
        Self {
            kind: SignalKind::NoSignal,
            price,
            confidence: 0.0,
            origin: None,
        }
    }
}

// ============================================================================
// Auction input
// ============================================================================

/// Opening gap classification from the pre-market auction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GapType {
    HighGapUp,
    GapUp,
    Flat,
    GapDown,
    LowGapDown,
}

/// Auction factor supplied by an external collaborator (or by `auction::assess`)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AuctionInput {
    /// Sub-score in [0, 1]
    pub score: f64,
    pub gap: GapType,
}

// ============================================================================
// Scoring output
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceTier {
    Low,
    Medium,
    High,
    VeryHigh,
}

impl std::fmt::Display for ConfidenceTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfidenceTier::Low => write!(f, "low"),
            ConfidenceTier::Medium => write!(f, "medium"),
            ConfidenceTier::High => write!(f, "high"),
            ConfidenceTier::VeryHigh => write!(f, "very_high"),
        }
    }
}

/// Independent factor scores, each in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FactorScores {
    pub technical: f64,
    pub volume: f64,
    pub momentum: f64,
    pub volatility: f64,
    pub auction: Option<f64>,
}

/// Final decision record handed to the screening pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub symbol: String,
    pub as_of: NaiveDateTime,
    pub current_price: f64,
    pub scores: FactorScores,
    pub total_score: f64,
    pub tier: ConfidenceTier,
    pub trend: Trend,
    pub signal: SignalKind,
    pub signal_confidence: f64,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub risk_reward_ratio: f64,
    pub rsi: f64,
    pub volume_ratio: f64,
    pub annualized_volatility: f64,
    pub segments_count: usize,
    pub pivots_count: usize,
    pub gap: Option<GapType>,
}

/// Why a symbol produced no recommendation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum Rejection {
    InsufficientData { available: usize, required: usize },
    PriceOutOfRange { price: f64 },
    Illiquid { average_amount: f64 },
    ExcessiveVolatility { annualized: f64 },
    NoSignal,
    NotInUptrend,
    NotLeader { return_pct: f64, volume_activity: f64 },
    UnconfirmedVolume {
        signal: SignalKind,
        volume_factor: f64,
        pullback_factor: f64,
    },
    BelowGate { total_score: f64 },
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::InsufficientData {
                available,
                required,
            } => write!(f, "insufficient data ({available}/{required} candles)"),
            Rejection::PriceOutOfRange { price } => write!(f, "price {price:.2} out of range"),
            Rejection::Illiquid { average_amount } => {
                write!(f, "illiquid (avg amount {average_amount:.0})")
            }
            Rejection::ExcessiveVolatility { annualized } => {
                write!(f, "volatility {annualized:.2} too high")
            }
            Rejection::NoSignal => write!(f, "no buy signal"),
            Rejection::NotInUptrend => write!(f, "no daily uptrend"),
            Rejection::NotLeader {
                return_pct,
                volume_activity,
            } => write!(
                f,
                "not a leader (return {return_pct:.1}%, activity {volume_activity:.2})"
            ),
            Rejection::UnconfirmedVolume {
                signal,
                volume_factor,
                pullback_factor,
            } => write!(
                f,
                "{signal} without volume confirmation (factor {volume_factor:.2}, pullback {pullback_factor:.2})"
            ),
            Rejection::BelowGate { total_score } => {
                write!(f, "score {total_score:.3} below gate")
            }
        }
    }
}

/// Outcome of screening one symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum Screening {
    Recommended(ScoreRecord),
    Rejected { symbol: String, rejection: Rejection },
}

impl Screening {
    pub fn record(&self) -> Option<&ScoreRecord> {
        match self {
            Screening::Recommended(record) => Some(record),
            Screening::Rejected { .. } => None,
        }
    }

    pub fn into_record(self) -> Option<ScoreRecord> {
        match self {
            Screening::Recommended(record) => Some(record),
            Screening::Rejected { .. } => None,
        }
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Screening::Recommended(_) => None,
            Screening::Rejected { rejection, .. } => Some(rejection),
        }
    }
}
