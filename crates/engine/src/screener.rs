//! Screening entry point
//!
//! `Screener` owns one validated `EngineConfig` and runs the whole pipeline
//! for a symbol: normalize, compute indicators, analyze structure, apply the
//! selection filters, score and gate. It holds no mutable state, so one
//! instance can be shared across threads and called concurrently.

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::confirm::{self, Confirmation};
use crate::error::{EngineError, EngineResult};
use crate::indicators::{IndicatorBank, IndicatorSnapshot};
use crate::normalize::{normalize, RawRow};
use crate::presets::Preset;
use crate::risk::{trade_levels, TradeLevels};
use crate::scoring;
use crate::structure::{self, Structure};
use crate::types::{
    AuctionInput, ConfidenceTier, FactorScores, Rejection, ScoreRecord, Screening, Series,
};

/// Everything computed for one series, before filters and gating
#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub symbol: String,
    pub as_of: NaiveDateTime,
    pub snapshot: IndicatorSnapshot,
    pub structure: Structure,
    pub scores: FactorScores,
    pub total_score: f64,
    pub annualized_volatility: f64,
    pub levels: TradeLevels,
    pub confirmation: Confirmation,
}

#[derive(Debug, Clone)]
pub struct Screener {
    config: EngineConfig,
}

impl Screener {
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn with_preset(preset: Preset) -> EngineResult<Self> {
        Self::new(preset.config())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Normalize raw rows and screen the result. Too few usable rows is a
    /// `Rejection::InsufficientData`, not an error.
    pub fn screen(
        &self,
        symbol: &str,
        rows: &[RawRow],
        auction: Option<&AuctionInput>,
    ) -> EngineResult<Screening> {
        match normalize(symbol, rows, self.config.structure.min_candles) {
            Ok(series) => self.screen_series(&series, auction),
            Err(EngineError::InsufficientData {
                available,
                required,
            }) => Ok(self.reject(symbol, Rejection::InsufficientData { available, required })),
            Err(e) => Err(e),
        }
    }

    pub fn screen_series(
        &self,
        series: &Series,
        auction: Option<&AuctionInput>,
    ) -> EngineResult<Screening> {
        let symbol = series.symbol();
        let selection = &self.config.selection;

        let required = self.config.required_history();
        if series.len() < required {
            return Ok(self.reject(
                symbol,
                Rejection::InsufficientData {
                    available: series.len(),
                    required,
                },
            ));
        }

        let price = series.last().map_or(0.0, |c| c.close);
        if price < selection.min_price || price > selection.max_price {
            return Ok(self.reject(symbol, Rejection::PriceOutOfRange { price }));
        }

        if let Some(min_amount) = selection.min_avg_amount {
            let average_amount = average_amount(series, selection.liquidity_window);
            if average_amount < min_amount {
                return Ok(self.reject(symbol, Rejection::Illiquid { average_amount }));
            }
        }

        let analysis = self.analyze(series, auction)?;

        if analysis.annualized_volatility > selection.max_volatility {
            return Ok(self.reject(
                symbol,
                Rejection::ExcessiveVolatility {
                    annualized: analysis.annualized_volatility,
                },
            ));
        }

        let signal = analysis.structure.signal;
        if self.config.scoring.require_signal && !signal.kind.is_buy() {
            return Ok(self.reject(symbol, Rejection::NoSignal));
        }

        let confirmation = &analysis.confirmation;
        if selection.uptrend.enabled && !confirmation.uptrend {
            return Ok(self.reject(symbol, Rejection::NotInUptrend));
        }
        if selection.leader.enabled {
            let leads = confirmation
                .leader
                .is_some_and(|l| l.is_leader(&selection.leader));
            if !leads {
                let (return_pct, volume_activity) = confirmation
                    .leader
                    .map_or((0.0, confirm::NEUTRAL_VOLUME_RATIO), |l| (l.return_pct, l.volume_activity));
                return Ok(self.reject(
                    symbol,
                    Rejection::NotLeader {
                        return_pct,
                        volume_activity,
                    },
                ));
            }
        }
        if selection.volume_confirmation.enabled
            && !confirm::volume_confirms(signal.kind, &confirmation.volume, &selection.volume_confirmation)
        {
            return Ok(self.reject(
                symbol,
                Rejection::UnconfirmedVolume {
                    signal: signal.kind,
                    volume_factor: confirmation.volume.volume_factor,
                    pullback_factor: confirmation.volume.pullback_factor,
                },
            ));
        }

        let Some(tier) = self.decide(analysis.total_score) else {
            return Ok(self.reject(
                symbol,
                Rejection::BelowGate {
                    total_score: analysis.total_score,
                },
            ));
        };

        let record = ScoreRecord {
            symbol: symbol.to_string(),
            as_of: analysis.as_of,
            current_price: price,
            scores: analysis.scores,
            total_score: analysis.total_score,
            tier,
            trend: analysis.structure.trend,
            signal: signal.kind,
            signal_confidence: signal.confidence,
            entry_price: analysis.levels.entry,
            stop_loss: analysis.levels.stop_loss,
            take_profit: analysis.levels.take_profit,
            risk_reward_ratio: analysis.levels.risk_reward_ratio,
            rsi: analysis.snapshot.rsi,
            volume_ratio: analysis.snapshot.volume_ratio,
            annualized_volatility: analysis.annualized_volatility,
            segments_count: analysis.structure.segments.len(),
            pivots_count: analysis.structure.pivots.len(),
            gap: auction.map(|a| a.gap),
        };

        info!(
            symbol,
            total_score = %format_args!("{:.3}", record.total_score),
            %tier,
            signal = %record.signal,
            entry = record.entry_price,
            stop = record.stop_loss,
            target = record.take_profit,
            "Symbol recommended"
        );

        Ok(Screening::Recommended(record))
    }

    /// Run indicators, structure, scoring and the confirmation measurements
    /// without any filter or gate
    pub fn analyze(&self, series: &Series, auction: Option<&AuctionInput>) -> EngineResult<Analysis> {
        let bank = IndicatorBank::compute(series, &self.config.indicators)?;
        let (Some(snapshot), Some(last)) = (bank.latest(), series.last()) else {
            return Err(EngineError::InsufficientData {
                available: 0,
                required: self.config.structure.min_candles,
            });
        };

        let structure = structure::analyze(series, &bank, &self.config.structure);
        let scores = scoring::score_factors(series, &bank, &structure, auction, &self.config.scoring);
        let total_score = scoring::total_score(&scores, &self.config.scoring.weights);
        let annualized_volatility = scoring::annualized_volatility(series, &bank);
        let levels = trade_levels(last.close, structure.latest_pivot(), &self.config.risk);
        let confirmation = confirm::confirm(series, &bank, &structure, &self.config.selection);

        debug!(
            symbol = series.symbol(),
            technical = scores.technical,
            volume = scores.volume,
            momentum = scores.momentum,
            volatility = scores.volatility,
            auction = ?scores.auction,
            total_score,
            "Factors scored"
        );

        Ok(Analysis {
            symbol: series.symbol().to_string(),
            as_of: last.timestamp,
            snapshot,
            structure,
            scores,
            total_score,
            annualized_volatility,
            levels,
            confirmation,
        })
    }

    /// Confidence tier for a total that clears the gate, `None` otherwise.
    /// A `low` tier is suppressed even when the gate sits below it.
    pub fn decide(&self, total_score: f64) -> Option<ConfidenceTier> {
        let gate = &self.config.scoring;
        if !scoring::passes_gate(total_score, gate.min_score) {
            return None;
        }
        match scoring::tier_for(total_score, &gate.tiers) {
            ConfidenceTier::Low => None,
            tier => Some(tier),
        }
    }

    fn reject(&self, symbol: &str, rejection: Rejection) -> Screening {
        info!(symbol, reason = %rejection, "Symbol rejected");
        Screening::Rejected {
            symbol: symbol.to_string(),
            rejection,
        }
    }
}

/// Mean traded amount over the last `window` candles; close x volume stands
/// in where the source gave no amount.
fn average_amount(series: &Series, window: usize) -> f64 {
    let candles = series.candles();
    let recent = &candles[candles.len().saturating_sub(window)..];
    if recent.is_empty() {
        return 0.0;
    }
    recent
        .iter()
        .map(|c| c.amount.unwrap_or(c.close * c.volume))
        .sum::<f64>()
        / recent.len() as f64
}

/// Best first. Ties keep their input order.
pub fn rank(records: &mut [ScoreRecord]) {
    records.sort_by(|a, b| b.total_score.total_cmp(&a.total_score));
}
