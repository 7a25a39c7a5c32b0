//! Error types for Cardex

use thiserror::Error;

/// Result type alias for Cardex operations
pub type Result<T> = std::result::Result<T, CardexError>;

/// Main error type for Cardex
#[derive(Error, Debug)]
pub enum CardexError {
    #[error("Unknown cadence: {0}")]
    UnknownCadence(String),

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
