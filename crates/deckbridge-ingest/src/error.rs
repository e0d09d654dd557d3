//! Error types for the ingestion pipeline.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during ingestion.
#[derive(Error, Debug)]
pub enum Error {
    /// Persistence primitive error (SQLite or in-memory backend).
    #[error("Store error: {0}")]
    Store(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Core model error (e.g., malformed post id).
    #[error(transparent)]
    Core(#[from] deckbridge_core::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Input validation error.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Host page never finished rendering within the retry budget.
    #[error("Host page not ready after {attempts} attempts")]
    HostNotReady { attempts: u32 },
}
