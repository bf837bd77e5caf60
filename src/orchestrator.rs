//! The poll loop.
//!
//! [`StreamOrchestrator`] runs one cycle at a time:
//!
//! 1. list subscriptions from the [`SubscriptionSource`]
//! 2. load and publish history for every subscription not yet cached
//! 3. sleep for the poll interval
//! 4. fetch quotes for all seeded subscriptions in one batched call
//! 5. bucket each quote and publish it
//!
//! and stops at the end of a cycle once [`Shutdown`] has been requested.
//! Everything runs sequentially on the calling task; within a cycle all
//! history items are published before any quote item.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::Result;
use crate::bucketer::{CatchUp, TemporalBucketer};
use crate::models::{Payload, PriceHistory, Subscription};
use crate::provider::MarketDataProvider;
use crate::publisher::{MessageBus, Publisher};
use crate::source::SubscriptionSource;

/// Cooperative stop request shared between the loop and whoever wants it
/// stopped (usually a signal handler).
#[derive(Debug, Clone, Default)]
pub struct Shutdown(Arc<AtomicBool>);

impl Shutdown {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Asks the loop to stop after its current cycle.
    pub fn request(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Where the loop is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Starting,
    Polling,
    Sleeping,
    Stopped,
}

/// Loop timing and bucketing behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSettings {
    pub poll_interval: Duration,
    pub catch_up: CatchUp,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(3),
            catch_up: CatchUp::default(),
        }
    }
}

/// One message bound for a subscription's channel.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamItem {
    pub subscription: Subscription,
    pub payload: Payload,
}

/// How a finished [`StreamOrchestrator::run`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamExit {
    /// Cycles completed, including the one during which shutdown was seen.
    pub cycles: u64,
    /// Always [`StreamState::Stopped`] once `run` returns.
    pub state: StreamState,
}

/// What a single cycle published.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub histories: usize,
    pub quotes: usize,
}

/// Drives polling, bucketing and publishing for a changing set of
/// subscriptions.
pub struct StreamOrchestrator<P, S, B> {
    provider: P,
    source: S,
    publisher: Publisher<B>,
    bucketer: TemporalBucketer,
    histories: HashMap<Subscription, PriceHistory>,
    settings: StreamSettings,
    shutdown: Shutdown,
    state: StreamState,
}

impl<P, S, B> StreamOrchestrator<P, S, B>
where
    P: MarketDataProvider,
    S: SubscriptionSource,
    B: MessageBus,
{
    pub fn new(
        provider: P,
        source: S,
        publisher: Publisher<B>,
        settings: StreamSettings,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            provider,
            source,
            publisher,
            bucketer: TemporalBucketer::new(settings.catch_up),
            histories: HashMap::new(),
            settings,
            shutdown,
            state: StreamState::Starting,
        }
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    #[cfg(test)]
    fn publisher(&self) -> &Publisher<B> {
        &self.publisher
    }

    /// Runs cycles until shutdown is requested.
    ///
    /// The orchestrator is consumed: a stopped stream cannot be resumed, and
    /// a new one starts with no cached histories or boundaries. The returned
    /// [`StreamExit`] carries the final state and the number of cycles run.
    ///
    /// # Errors
    ///
    /// Returns the first unrecoverable error, typically a
    /// [`TickercastError::PublishConnection`](crate::TickercastError::PublishConnection)
    /// once the bus has been unreachable for the whole retry budget.
    pub async fn run(mut self) -> Result<StreamExit> {
        info!(
            poll_interval = ?self.settings.poll_interval,
            catch_up = ?self.settings.catch_up,
            "Starting stream"
        );

        let mut cycles: u64 = 0;
        loop {
            let outcome = self.poll_cycle().await;
            cycles += 1;

            if let Err(e) = outcome {
                self.transition(StreamState::Stopped);
                error!(error = %e, cycles, "Stream stopped on fatal error");
                return Err(e);
            }

            if self.shutdown.is_requested() {
                self.transition(StreamState::Stopped);
                info!(cycles, "Shutdown requested, stream stopped");
                return Ok(StreamExit {
                    cycles,
                    state: self.state,
                });
            }
        }
    }

    /// Runs a single cycle and reports how many items it published.
    ///
    /// Per-subscription history failures and a failed quote batch are
    /// logged and skipped.
    ///
    /// # Errors
    ///
    /// Returns any error that is not
    /// [recoverable](crate::TickercastError::is_recoverable), including
    /// every publish failure.
    pub async fn poll_cycle(&mut self) -> Result<CycleReport> {
        self.transition(StreamState::Polling);
        let mut report = CycleReport::default();

        let subscriptions = self.current_subscriptions().await;

        for subscription in &subscriptions {
            if self.histories.contains_key(subscription) {
                continue;
            }
            if let Some(item) = self.load_history(subscription).await? {
                self.emit(item).await?;
                report.histories += 1;
            }
        }

        self.transition(StreamState::Sleeping);
        tokio::time::sleep(self.settings.poll_interval).await;
        self.transition(StreamState::Polling);

        let seeded: Vec<&Subscription> = subscriptions
            .iter()
            .filter(|s| self.bucketer.is_seeded(s))
            .collect();
        if seeded.is_empty() {
            debug!("No seeded subscriptions, skipping quotes");
            return Ok(report);
        }

        let mut symbols = Vec::new();
        let mut seen = HashSet::new();
        for subscription in &seeded {
            let key = subscription.quote_key();
            if seen.insert(key.clone()) {
                symbols.push(key);
            }
        }

        let quotes = match self.provider.quotes(&symbols).await {
            Ok(quotes) => quotes,
            Err(e) if e.is_recoverable() => {
                warn!(error = %e, symbols = symbols.len(), "Skipping quotes this cycle");
                return Ok(report);
            }
            Err(e) => return Err(e),
        };

        for subscription in seeded {
            let Some(quote) = quotes.get(&subscription.quote_key()) else {
                warn!(%subscription, "No quote returned for subscription");
                continue;
            };
            let Some(bucketed) = self.bucketer.bucket(subscription, quote) else {
                continue;
            };
            self.emit(StreamItem {
                subscription: subscription.clone(),
                payload: Payload::Quote(bucketed),
            })
            .await?;
            report.quotes += 1;
        }

        debug!(
            histories = report.histories,
            quotes = report.quotes,
            "Cycle complete"
        );
        Ok(report)
    }

    /// Lists subscriptions, dropping repeats. A failing source yields an
    /// empty list for this cycle.
    async fn current_subscriptions(&self) -> Vec<Subscription> {
        let listed = match self.source.list_subscriptions().await {
            Ok(listed) => listed,
            Err(e) => {
                warn!(error = %e, "Failed to list subscriptions");
                return Vec::new();
            }
        };

        let mut seen = HashSet::with_capacity(listed.len());
        let subscriptions: Vec<Subscription> = listed
            .into_iter()
            .filter(|s| seen.insert(s.clone()))
            .collect();

        info!(
            count = subscriptions.len(),
            subscriptions = ?subscriptions.iter().map(ToString::to_string).collect::<Vec<_>>(),
            "Polling subscriptions"
        );
        subscriptions
    }

    /// Fetches history, seeds the bucketer and caches it. Returns `None` when
    /// the subscription should be retried next cycle.
    async fn load_history(&mut self, subscription: &Subscription) -> Result<Option<StreamItem>> {
        let fetched = self
            .provider
            .price_history(
                &subscription.symbol,
                &subscription.frequency,
                &subscription.period,
            )
            .await;

        let seeded = fetched.and_then(|history| {
            let next_close = self.bucketer.seed(subscription, &history)?;
            Ok((history, next_close))
        });

        let (history, next_close) = match seeded {
            Ok(seeded) => seeded,
            Err(e) if e.is_recoverable() => {
                warn!(%subscription, error = %e, "History unavailable, retrying next cycle");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        self.warn_if_interval_exceeds_step(subscription);
        info!(
            %subscription,
            candles = history.candles.len(),
            next_close,
            "Loaded price history"
        );

        self.histories.insert(subscription.clone(), history.clone());
        Ok(Some(StreamItem {
            subscription: subscription.clone(),
            payload: Payload::History(history),
        }))
    }

    fn warn_if_interval_exceeds_step(&self, subscription: &Subscription) {
        let Ok(frequency) = subscription.parsed_frequency() else {
            return;
        };
        let step_ms = frequency.step_ms();
        if interval_exceeds_step(self.settings.poll_interval, step_ms, self.settings.catch_up) {
            warn!(
                %subscription,
                poll_interval = ?self.settings.poll_interval,
                step_ms,
                "Poll interval exceeds frequency step; boundaries will lag behind quotes"
            );
        }
    }

    fn transition(&mut self, next: StreamState) {
        if self.state != next {
            debug!(from = ?self.state, to = ?next, "Stream state changed");
            self.state = next;
        }
    }

    async fn emit(&mut self, item: StreamItem) -> Result<()> {
        let channel = item.subscription.channel_name();
        self.publisher.publish(&channel, &item.payload).await
    }
}

/// Whether single-step bucketing would fall behind: the loop sleeps longer
/// than one candle, so a quote can skip a whole boundary between polls.
/// Never true under [`CatchUp::AllSteps`].
fn interval_exceeds_step(poll_interval: Duration, step_ms: i64, catch_up: CatchUp) -> bool {
    if catch_up != CatchUp::SingleStep {
        return false;
    }
    let step = Duration::from_millis(u64::try_from(step_ms).unwrap_or(0));
    poll_interval > step
}
