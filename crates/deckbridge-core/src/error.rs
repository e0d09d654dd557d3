//! Error types shared across the deckbridge crates.

use thiserror::Error;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or validating relay messages.
#[derive(Error, Debug)]
pub enum Error {
    /// Post identifier is not a decimal snowflake.
    #[error("invalid post ID '{raw}': {reason}")]
    InvalidPostId {
        /// The identifier as it appeared in the markup.
        raw: String,
        /// Description of what's wrong.
        reason: &'static str,
    },

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
