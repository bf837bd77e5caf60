//! Market data polling and candle-aligned quote streaming.
//!
//! Polls a market data provider for a changing set of subscriptions,
//! publishes each subscription's price history once, then publishes every
//! polled quote stamped with the close time of the candle it falls into.
//! Messages go to a Redis pub/sub channel per subscription.

pub mod auth;
pub mod bucketer;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod orchestrator;
pub mod provider;
pub mod publisher;
pub mod source;

pub use error::{Result, TickercastError};
