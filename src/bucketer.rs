//! Temporal bucketing of real-time quotes into candle boundaries.
//!
//! [`TemporalBucketer`] keeps, per subscription, the close timestamp of the
//! candle currently being formed. Each incoming quote is stamped with that
//! boundary instead of its observation time, and the boundary advances once
//! the quote reaches it.

use std::collections::HashMap;

use serde::Deserialize;
use tracing::debug;

use crate::models::{PriceHistory, Quote, Subscription};
use crate::{Result, TickercastError};

/// How far a boundary moves when a quote reaches or passes it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatchUp {
    /// Advance exactly one step per quote, however far it overshoots.
    /// Assumes the poll interval never exceeds one frequency step.
    #[default]
    SingleStep,
    /// Advance until the boundary lies strictly after the quote.
    AllSteps,
}

#[derive(Debug, Clone, Copy)]
struct Boundary {
    next_close: i64,
    step: i64,
}

/// Per-subscription candle boundary state.
#[derive(Debug, Default)]
pub struct TemporalBucketer {
    boundaries: HashMap<Subscription, Boundary>,
    catch_up: CatchUp,
}

impl TemporalBucketer {
    #[must_use]
    pub fn new(catch_up: CatchUp) -> Self {
        Self {
            boundaries: HashMap::new(),
            catch_up,
        }
    }

    /// Starts tracking `subscription` one step after its last historical
    /// candle and returns that boundary.
    ///
    /// Calling this again for the same subscription overwrites its state.
    ///
    /// # Errors
    ///
    /// Returns [`TickercastError::UnknownFrequency`] if the frequency cannot
    /// be parsed, or [`TickercastError::DataUnavailable`] if the history has
    /// no candles.
    pub fn seed(&mut self, subscription: &Subscription, history: &PriceHistory) -> Result<i64> {
        let step = subscription.parsed_frequency()?.step_ms();
        let last = history.last_candle().ok_or_else(|| {
            TickercastError::DataUnavailable(format!("no candles in history for {subscription}"))
        })?;

        let next_close = last.datetime.checked_add(step).ok_or_else(|| {
            TickercastError::UnknownFrequency(subscription.frequency.clone())
        })?;
        self.boundaries
            .insert(subscription.clone(), Boundary { next_close, step });
        debug!(%subscription, next_close, step, "Seeded candle boundary");

        Ok(next_close)
    }

    /// Stamps `quote` with the boundary it belongs to, advancing the
    /// boundary if the quote has reached it.
    ///
    /// Returns `None` if `subscription` has not been seeded.
    pub fn bucket(&mut self, subscription: &Subscription, quote: &Quote) -> Option<Quote> {
        let catch_up = self.catch_up;
        let boundary = self.boundaries.get_mut(subscription)?;
        let t = quote.quote_time();

        if boundary.next_close <= t {
            boundary.next_close = boundary.next_close.saturating_add(boundary.step);
            if catch_up == CatchUp::AllSteps {
                while boundary.next_close <= t && boundary.next_close < i64::MAX {
                    boundary.next_close = boundary.next_close.saturating_add(boundary.step);
                }
            }
            debug!(%subscription, next_close = boundary.next_close, "Candle boundary advanced");
        }

        Some(quote.with_quote_time(boundary.next_close))
    }

    /// Returns the current boundary for `subscription`, if seeded.
    pub fn next_close(&self, subscription: &Subscription) -> Option<i64> {
        self.boundaries.get(subscription).map(|b| b.next_close)
    }

    /// Returns `true` if `subscription` has been seeded.
    pub fn is_seeded(&self, subscription: &Subscription) -> bool {
        self.boundaries.contains_key(subscription)
    }
}
