use std::time::Duration;

use thiserror::Error;

/// Canonical error type exposed by the core primitives.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReelError {
    /// Movie identifier is empty or contains characters outside `[A-Za-z0-9_-]`.
    #[error("invalid movie id: {0:?}")]
    InvalidMovieId(String),

    /// Wallet address is empty.
    #[error("address must not be empty")]
    EmptyAddress,

    /// Backing vote source could not be read.
    #[error("vote source unavailable: {0}")]
    SourceUnavailable(String),

    /// Backing vote source did not answer in time.
    #[error("vote source timed out after {0:?}")]
    SourceTimeout(Duration),

    /// Address already used its votes for the current day.
    #[error("daily vote quota of {limit} exhausted")]
    QuotaExceeded { limit: u32 },

    /// Transaction does not target the vote contract method.
    #[error("unsupported contract call: {0}")]
    UnsupportedCall(String),
}

impl ReelError {
    /// Caller supplied a bad identifier; nothing was sent to a backing source.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            ReelError::InvalidMovieId(_) | ReelError::EmptyAddress | ReelError::UnsupportedCall(_)
        )
    }

    /// Backing source failed or timed out.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            ReelError::SourceUnavailable(_) | ReelError::SourceTimeout(_)
        )
    }
}
