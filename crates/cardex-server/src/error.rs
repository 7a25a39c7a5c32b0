//! Sync error types
//!
//! `Fetch`, `Decode` and `Persistence` are cycle-scoped: the scheduler catches
//! them at the top of a cadence invocation, logs them and carries on.

use thiserror::Error;

/// Result type alias for sync operations
pub type SyncResult<T> = std::result::Result<T, SyncError>;

/// Errors raised while refreshing the catalog or prices
#[derive(Error, Debug)]
pub enum SyncError {
    /// Non-success status, empty body or transport failure while downloading
    #[error("Fetch error: {0}")]
    Fetch(String),

    /// Malformed compressed or structured content
    #[error("Decode error: {0}")]
    Decode(String),

    /// Insert, update or transaction failure in the store
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cardex error: {0}")]
    Common(#[from] cardex_common::CardexError),
}

impl SyncError {
    /// Short label used as a structured log field
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::Fetch(_) => "fetch",
            SyncError::Decode(_) => "decode",
            SyncError::Persistence(_) => "persistence",
            SyncError::Io(_) => "io",
            SyncError::Config(_) => "config",
            SyncError::Common(_) => "common",
        }
    }
}

impl From<sqlx::Error> for SyncError {
    fn from(err: sqlx::Error) -> Self {
        SyncError::Persistence(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for SyncError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        SyncError::Persistence(format!("migration failed: {}", err))
    }
}

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        SyncError::Fetch(err.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Decode(err.to_string())
    }
}
