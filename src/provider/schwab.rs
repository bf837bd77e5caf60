//! Schwab trader API market data client.
//!
//! See the [Market Data Production](https://developer.schwab.com/products/trader-api--individual/details/specifications/Market%20Data%20Production)
//! specification for the endpoints used here.

use std::collections::HashMap;

use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use zeroize::Zeroizing;

use super::MarketDataProvider;
use crate::auth::{Tokens, refresh_access_token, with_reauthorization};
use crate::config::SchwabConfig;
use crate::models::{Frequency, Period, PriceHistory, Quote};
use crate::{Result, TickercastError};

const PRICE_HISTORY_PATH: &str = "/marketdata/v1/pricehistory";
const QUOTES_PATH: &str = "/marketdata/v1/quotes";

/// Authenticated client for Schwab's market data endpoints.
pub struct SchwabClient {
    http: reqwest::Client,
    base_url: String,
    token_url: String,
    api_key: String,
    api_secret: Zeroizing<String>,
    tokens: RwLock<Tokens>,
}

impl SchwabClient {
    /// Builds a client from resolved configuration.
    ///
    /// Without an access token the first request refreshes before sending,
    /// so a refresh token alone is enough to start.
    ///
    /// # Errors
    ///
    /// Returns [`TickercastError::Config`] if credentials are missing or the
    /// HTTP client cannot be built.
    pub fn from_config(config: &SchwabConfig) -> Result<Self> {
        let credentials = config.credentials.as_ref().ok_or_else(|| {
            TickercastError::Config("Schwab credentials are not configured".to_string())
        })?;

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| TickercastError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token_url: config.token_url.clone(),
            api_key: credentials.api_key.clone(),
            api_secret: credentials.api_secret.clone(),
            tokens: RwLock::new(Tokens {
                access_token: credentials
                    .access_token
                    .clone()
                    .unwrap_or_else(|| Zeroizing::new(String::new())),
                refresh_token: credentials.refresh_token.clone(),
            }),
        })
    }

    /// Fetches price history with optional date bounds (epoch ms) and
    /// extended-hours candles.
    ///
    /// # Errors
    ///
    /// - [`TickercastError::UnknownFrequency`] / [`TickercastError::UnknownPeriod`]
    ///   if the timeframe strings cannot be parsed.
    /// - [`TickercastError::DataUnavailable`] on transport, status, decode,
    ///   or unrecoverable auth failures.
    pub async fn price_history_between(
        &self,
        symbol: &str,
        frequency: &str,
        period: &str,
        start_date: Option<i64>,
        end_date: Option<i64>,
        extended_hours: bool,
    ) -> Result<PriceHistory> {
        let frequency: Frequency = frequency.parse()?;
        let period: Period = period.parse()?;
        let query = price_history_query(
            symbol,
            &frequency,
            &period,
            start_date,
            end_date,
            extended_hours,
        );
        let query = &query;

        let history: PriceHistory = with_reauthorization(
            move || self.get_json(PRICE_HISTORY_PATH, query),
            move || self.reauthorize(),
        )
        .await?;

        debug!(
            symbol,
            candles = history.candles.len(),
            "Fetched price history"
        );
        Ok(history)
    }

    /// Sends an authorized GET and decodes the JSON body.
    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let access_token = self.tokens.read().await.access_token.clone();
        if access_token.is_empty() {
            return Err(TickercastError::AuthExpired("no access token yet".to_string()));
        }
        let url = format!("{}{}", self.base_url, path);

        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token.as_str())
            .query(query)
            .send()
            .await
            .map_err(|e| TickercastError::DataUnavailable(format!("request to {path} failed: {e}")))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(TickercastError::AuthExpired(format!("{path} returned 401")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TickercastError::DataUnavailable(format!(
                "{path} returned {status}: {body}"
            )));
        }

        response
            .json()
            .await
            .map_err(|e| TickercastError::DataUnavailable(format!("malformed response from {path}: {e}")))
    }

    /// Replaces the access token using the stored refresh token.
    async fn reauthorize(&self) -> Result<()> {
        let refresh_token = self
            .tokens
            .read()
            .await
            .refresh_token
            .clone()
            .ok_or_else(|| TickercastError::AuthExpired("no refresh token configured".to_string()))?;

        let response = refresh_access_token(
            &self.http,
            &self.token_url,
            &self.api_key,
            &self.api_secret,
            &refresh_token,
        )
        .await?;

        self.tokens.write().await.update(response);
        Ok(())
    }
}

impl MarketDataProvider for SchwabClient {
    async fn price_history(&self, symbol: &str, frequency: &str, period: &str) -> Result<PriceHistory> {
        self.price_history_between(symbol, frequency, period, None, None, false)
            .await
    }

    async fn quotes(&self, symbols: &[String]) -> Result<HashMap<String, Quote>> {
        let query = vec![("symbols", quote_symbols_param(symbols))];
        let query = &query;

        let raw: HashMap<String, serde_json::Value> = with_reauthorization(
            move || self.get_json(QUOTES_PATH, query),
            move || self.reauthorize(),
        )
        .await?;

        let mut quotes = HashMap::with_capacity(raw.len());
        for (key, value) in raw {
            match serde_json::from_value::<Quote>(value) {
                Ok(quote) => {
                    quotes.insert(key, quote);
                }
                Err(e) => warn!(key = %key, "Skipping quote entry without quoteTime: {e}"),
            }
        }

        debug!(requested = symbols.len(), received = quotes.len(), "Fetched quotes");
        Ok(quotes)
    }
}

/// Query parameters for the price history endpoint.
fn price_history_query(
    symbol: &str,
    frequency: &Frequency,
    period: &Period,
    start_date: Option<i64>,
    end_date: Option<i64>,
    extended_hours: bool,
) -> Vec<(&'static str, String)> {
    let mut query = vec![
        ("symbol", symbol.to_uppercase()),
        ("periodType", period.unit.as_str().to_string()),
        ("period", period.multiplier.to_string()),
        ("frequencyType", frequency.unit.as_str().to_string()),
        ("frequency", frequency.multiplier.to_string()),
    ];

    if let Some(start) = start_date {
        query.push(("startDate", start.to_string()));
    }
    if let Some(end) = end_date {
        query.push(("endDate", end.to_string()));
    }

    query.push(("needExtendedHoursData", extended_hours.to_string()));
    query.push(("needPreviousClose", "true".to_string()));
    query
}

/// Comma-joined, upper-cased symbol list.
fn quote_symbols_param(symbols: &[String]) -> String {
    symbols
        .iter()
        .map(|s| s.to_uppercase())
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param<'a>(query: &'a [(&str, String)], name: &str) -> Option<&'a str> {
        query
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn price_history_query_splits_timeframes() {
        let query = price_history_query(
            "aapl",
            &"10daily".parse().unwrap(),
            &"1year".parse().unwrap(),
            None,
            None,
            false,
        );

        assert_eq!(param(&query, "symbol"), Some("AAPL"));
        assert_eq!(param(&query, "periodType"), Some("year"));
        assert_eq!(param(&query, "period"), Some("1"));
        assert_eq!(param(&query, "frequencyType"), Some("daily"));
        assert_eq!(param(&query, "frequency"), Some("10"));
        assert_eq!(param(&query, "needExtendedHoursData"), Some("false"));
        assert_eq!(param(&query, "needPreviousClose"), Some("true"));
        assert_eq!(param(&query, "startDate"), None);
        assert_eq!(param(&query, "endDate"), None);
    }

    #[test]
    fn price_history_query_includes_date_bounds() {
        let query = price_history_query(
            "aapl",
            &"5minute".parse().unwrap(),
            &"1day".parse().unwrap(),
            Some(1_717_778_681_000),
            Some(1_717_778_681_000),
            true,
        );

        assert_eq!(param(&query, "startDate"), Some("1717778681000"));
        assert_eq!(param(&query, "endDate"), Some("1717778681000"));
        assert_eq!(param(&query, "needExtendedHoursData"), Some("true"));
    }

    #[test]
    fn quote_symbols_are_upper_cased_and_joined() {
        let symbols = vec!["aapl".to_string(), "Msft".to_string()];
        assert_eq!(quote_symbols_param(&symbols), "AAPL,MSFT");
    }
}
