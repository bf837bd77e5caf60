//! Shared models for subscriptions and the market data they stream.
//!
//! Contains the [`Subscription`] key, channel naming for the pub/sub bus,
//! and the payload types published on those channels.

pub mod candle;
pub mod quote;
pub mod timeframe;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use candle::{Candle, PriceHistory};
pub use quote::{Quote, QuoteFields};
pub use timeframe::{Frequency, FrequencyUnit, Period, PeriodUnit};

/// One market data stream: a ticker sampled at a frequency over a period.
///
/// Two subscriptions are equal only if all three fields match exactly,
/// including casing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Subscription {
    pub symbol: String,
    /// Sampling granularity, e.g. `"1minute"` or `"daily"`.
    pub frequency: String,
    /// Historical window, e.g. `"1day"` or `"6month"`.
    pub period: String,
}

impl Subscription {
    pub fn new(
        symbol: impl Into<String>,
        frequency: impl Into<String>,
        period: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            frequency: frequency.into(),
            period: period.into(),
        }
    }

    /// Returns the pub/sub channel this subscription publishes on.
    ///
    /// Uses the subscription's own casing, e.g. `symbol-aapl-1minute-1day`.
    pub fn channel_name(&self) -> String {
        format!(
            "symbol-{}-{}-{}",
            self.symbol, self.frequency, self.period
        )
    }

    /// Key under which the provider returns quotes for this symbol.
    pub fn quote_key(&self) -> String {
        self.symbol.to_uppercase()
    }

    /// Parses the frequency string.
    ///
    /// # Errors
    ///
    /// Returns [`TickercastError::UnknownFrequency`](crate::TickercastError::UnknownFrequency)
    /// if the frequency is not recognized.
    pub fn parsed_frequency(&self) -> crate::Result<Frequency> {
        self.frequency.parse()
    }

    /// Parses the period string.
    ///
    /// # Errors
    ///
    /// Returns [`TickercastError::UnknownPeriod`](crate::TickercastError::UnknownPeriod)
    /// if the period is not recognized.
    pub fn parsed_period(&self) -> crate::Result<Period> {
        self.period.parse()
    }
}

impl fmt::Display for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.symbol, self.frequency, self.period)
    }
}

/// Body of a single message published on a subscription's channel.
///
/// Serializes as the bare inner object so subscribers see exactly the
/// provider's shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    History(PriceHistory),
    Quote(Quote),
}
