//! Error types for the portfolio sync engine

use thiserror::Error;

/// Errors a balance or price adapter can hit while talking to its
/// provider. These never cross the adapter boundary: every adapter
/// catches its own `SourceError` and degrades to zero-value output.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Network request failed
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// Invalid response from provider
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Provider API error
    #[error("Provider API error: {0}")]
    ApiError(String),

    /// Provider requires a credential that was not configured
    #[error("Missing API key")]
    MissingApiKey,
}

/// Errors surfaced by [`crate::throttler::Throttler::throttle`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ThrottleError {
    /// The throttler was dropped and its queue closed
    #[error("Throttler closed")]
    Closed,

    /// The work item died (panicked) before producing an outcome
    #[error("Throttled work dropped before completing")]
    Dropped,
}
