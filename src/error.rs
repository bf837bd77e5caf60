//! Crate-level error types.
//!
//! [`TickercastError`] unifies every error source (configuration, market
//! data, pub/sub bus, JSON) behind a single enum so callers can match on the
//! variant they care about while still using the `?` operator for easy
//! propagation.

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, TickercastError>;

/// Top-level error type returned by all public APIs.
#[derive(Debug, thiserror::Error)]
pub enum TickercastError {
    /// A configuration file or environment variable is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// The configured market data provider tag is not recognized.
    #[error("unknown stock provider: {0}")]
    UnknownProvider(String),

    /// The configured subscription source tag is not recognized.
    #[error("unknown subscription source: {0}")]
    UnknownSubscriptionSource(String),

    /// A subscription frequency could not be parsed (e.g. `"7fortnight"`).
    #[error("unknown frequency: {0}")]
    UnknownFrequency(String),

    /// A subscription period could not be parsed.
    #[error("unknown period: {0}")]
    UnknownPeriod(String),

    /// The provider could not deliver data (timeout, bad status, bad body).
    #[error("market data unavailable: {0}")]
    DataUnavailable(String),

    /// The provider rejected the current credentials.
    #[error("provider credentials expired: {0}")]
    AuthExpired(String),

    /// The pub/sub bus stayed unreachable for the whole retry budget.
    #[error("publish to {channel} failed after {attempts} attempts: {reason}")]
    PublishConnection {
        channel: String,
        attempts: u32,
        reason: String,
    },

    /// The pub/sub bus rejected a message for a reason retries cannot fix.
    #[error("publish error: {0}")]
    Publish(String),

    /// JSON serialization or deserialization failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TickercastError {
    /// Returns `true` for failures the poll loop skips over instead of
    /// terminating on.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::DataUnavailable(_)
                | Self::AuthExpired(_)
                | Self::UnknownFrequency(_)
                | Self::UnknownPeriod(_)
        )
    }
}
