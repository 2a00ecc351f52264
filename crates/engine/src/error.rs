//! Error taxonomy for the screening engine

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Fewer candles than a component needs. Callers treat this as
    /// "no recommendation", not as a failure.
    #[error("Insufficient data: {available} candles, {required} required")]
    InsufficientData { available: usize, required: usize },

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
