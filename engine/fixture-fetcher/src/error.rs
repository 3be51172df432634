//! Error types for the fixture fetcher
//!
//! Upstream trouble (bad status codes, rate limiting, malformed records) never
//! shows up here: those conditions degrade to defaults or empty results. These
//! errors cover setup problems that should stop the run.

use thiserror::Error;

/// Result type for fixture fetcher operations
pub type Result<T> = std::result::Result<T, FetcherError>;

/// Errors that can occur while setting up or finishing a run
#[derive(Error, Debug)]
pub enum FetcherError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Persistence error: {0}")]
    Persistence(#[from] persistence::PersistenceError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FetcherError {
    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }
}
