//! Market data providers.
//!
//! The poll loop only sees the [`MarketDataProvider`] trait. Which concrete
//! provider runs is chosen once at startup from [`ProviderKind`] and held in
//! the closed [`Provider`] enum.

pub mod schwab;

use std::collections::HashMap;
use std::future::Future;

use crate::Result;
use crate::config::{AppConfig, ProviderKind};
use crate::models::{PriceHistory, Quote};

pub use schwab::SchwabClient;

/// Source of historical candles and current quotes.
///
/// Implementations own their authentication; a call that fails after the
/// provider's own refresh-and-retry reports
/// [`TickercastError::DataUnavailable`](crate::TickercastError::DataUnavailable).
pub trait MarketDataProvider {
    /// Fetches the candle series for one symbol.
    fn price_history(
        &self,
        symbol: &str,
        frequency: &str,
        period: &str,
    ) -> impl Future<Output = Result<PriceHistory>> + Send;

    /// Fetches current quotes for `symbols` in one batched call, keyed by
    /// upper-case symbol.
    fn quotes(&self, symbols: &[String]) -> impl Future<Output = Result<HashMap<String, Quote>>> + Send;
}

/// Every provider this binary can be configured with.
pub enum Provider {
    Schwab(SchwabClient),
}

impl Provider {
    /// Builds the provider selected by `config.provider`.
    ///
    /// # Errors
    ///
    /// Returns [`TickercastError::Config`](crate::TickercastError::Config)
    /// if the provider's settings or credentials are incomplete.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        match config.provider {
            ProviderKind::Schwab => Ok(Provider::Schwab(SchwabClient::from_config(&config.schwab)?)),
        }
    }
}

impl MarketDataProvider for Provider {
    async fn price_history(&self, symbol: &str, frequency: &str, period: &str) -> Result<PriceHistory> {
        match self {
            Provider::Schwab(client) => client.price_history(symbol, frequency, period).await,
        }
    }

    async fn quotes(&self, symbols: &[String]) -> Result<HashMap<String, Quote>> {
        match self {
            Provider::Schwab(client) => client.quotes(symbols).await,
        }
    }
}
