//! Unified error types for the pipeline.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the live-analytics pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// The relay (or a watch call) was started before the store is reachable.
    /// Fatal to the start call only; the caller may retry later.
    #[error("store not connected: {0}")]
    NotConnected(String),

    /// A watch stream errored or ended. Recovered locally by resubscribing
    /// with the stored resume token; never surfaced to pipeline callers.
    #[error("subscription error: {0}")]
    Subscription(String),

    /// The store rejected a resume token (too old / invalidated). Recovered
    /// locally by resubscribing from "now"; the data gap is accepted.
    #[error("resume token invalidated: {0}")]
    TokenInvalidated(String),

    /// A read-side aggregation query failed. Logged and skipped for that
    /// trigger; subscription health is unaffected.
    #[error("aggregation error: {0}")]
    Aggregation(String),

    /// A session/event write failed. Surfaced to the tracker's caller,
    /// never retried automatically.
    #[error("storage error: {0}")]
    Storage(String),

    /// Delivery to one realtime subscriber failed. Isolated per-subscriber.
    #[error("publish error: {0}")]
    Publish(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn not_connected(msg: impl Into<String>) -> Self {
        Self::NotConnected(msg.into())
    }

    pub fn subscription(msg: impl Into<String>) -> Self {
        Self::Subscription(msg.into())
    }

    pub fn token_invalidated(msg: impl Into<String>) -> Self {
        Self::TokenInvalidated(msg.into())
    }

    pub fn aggregation(msg: impl Into<String>) -> Self {
        Self::Aggregation(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn publish(msg: impl Into<String>) -> Self {
        Self::Publish(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether the relay recovers from this error without surfacing it.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Subscription(_) | Self::TokenInvalidated(_))
    }

    /// Get the HTTP status code for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::NotConnected(_) => 503,
            Self::Subscription(_) => 503,
            Self::TokenInvalidated(_) => 503,
            Self::Aggregation(_) => 500,
            Self::Storage(_) => 500,
            Self::Publish(_) => 500,
            Self::Validation(_) => 400,
            Self::Unauthorized(_) => 401,
            Self::Forbidden(_) => 403,
            Self::Serialization(_) => 400,
            Self::Internal(_) => 500,
        }
    }
}
