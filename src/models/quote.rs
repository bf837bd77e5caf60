//! Real-time quote models.
//!
//! Only `quoteTime` is interpreted; every other field the provider sends is
//! carried through untouched so subscribers receive the full quote.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One symbol's entry in a quotes response, e.g. the value under `"AAPL"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub quote: QuoteFields,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The inner `quote` object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuoteFields {
    /// Observation time in epoch milliseconds.
    #[serde(rename = "quoteTime")]
    pub quote_time: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Quote {
    /// Observation time in epoch milliseconds.
    pub fn quote_time(&self) -> i64 {
        self.quote.quote_time
    }

    /// Returns a copy with `quoteTime` replaced.
    #[must_use]
    pub fn with_quote_time(&self, quote_time: i64) -> Self {
        let mut patched = self.clone();
        patched.quote.quote_time = quote_time;
        patched
    }
}
