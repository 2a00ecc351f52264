//! Named configuration presets
//!
//! Historical screening variants differed only in thresholds. Each one is a
//! preset here instead of a separate engine.

use serde::{Deserialize, Serialize};

use crate::config::{EngineConfig, FactorWeights};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    /// 5-bar minimum segments, 2% breakout margin, 60 candles of history,
    /// uptrend, leader and volume confirmations
    Strict,
    /// 3-bar minimum segments, no breakout margin, 30 candles of history
    Relaxed,
    /// Relaxed structure with momentum- and volume-heavy weights
    ShortTerm,
}

impl Preset {
    pub const ALL: [Preset; 3] = [Preset::Strict, Preset::Relaxed, Preset::ShortTerm];

    pub fn name(&self) -> &'static str {
        match self {
            Preset::Strict => "strict",
            Preset::Relaxed => "relaxed",
            Preset::ShortTerm => "short_term",
        }
    }

    pub fn config(&self) -> EngineConfig {
        match self {
            Preset::Strict => strict(),
            Preset::Relaxed => relaxed(),
            Preset::ShortTerm => {
                let mut config = relaxed();
                config.scoring.weights = FactorWeights {
                    technical: 0.20,
                    volume: 0.22,
                    momentum: 0.28,
                    volatility: 0.10,
                    auction: 0.20,
                };
                config
            }
        }
    }
}

impl std::fmt::Display for Preset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for Preset {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "strict" => Ok(Preset::Strict),
            "relaxed" => Ok(Preset::Relaxed),
            "short_term" => Ok(Preset::ShortTerm),
            other => Err(format!("unknown preset '{other}'")),
        }
    }
}

/// Defaults plus the uptrend, leader and volume confirmations
fn strict() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.selection.uptrend.enabled = true;
    config.selection.leader.enabled = true;
    config.selection.volume_confirmation.enabled = true;
    config
}

fn relaxed() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.structure.min_segment_bars = 3;
    config.structure.breakout_margin = 0.0;
    config.risk.stop_loss_pct = 0.06;
    config.risk.reward_multiple = 2.5;
    config.selection.min_history = 30;
    config.selection.max_volatility = 0.6;
    config
}
