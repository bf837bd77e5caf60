//! OHLCV candle and price history models.

use serde::{Deserialize, Serialize};

/// A single OHLCV bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    /// Close time of this candle in epoch milliseconds.
    pub datetime: i64,
}

/// Oldest-first candle series for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceHistory {
    pub candles: Vec<Candle>,
    pub symbol: String,
    #[serde(default)]
    pub empty: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_close: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_close_date: Option<i64>,
}

impl PriceHistory {
    /// Returns the most recent candle, if any.
    pub fn last_candle(&self) -> Option<&Candle> {
        self.candles.last()
    }
}
