//! Shared fakes and fixtures for integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::{Map, json};
use tickercast::bucketer::CatchUp;
use tickercast::models::{PriceHistory, Quote, QuoteFields, Subscription};
use tickercast::orchestrator::{Shutdown, StreamOrchestrator, StreamSettings};
use tickercast::provider::MarketDataProvider;
use tickercast::publisher::{BusError, MessageBus, Publisher};
use tickercast::source::SubscriptionSource;
use tickercast::{Result, TickercastError};

pub const PRICE_HISTORY_JSON: &str = include_str!("../fixtures/price_history.json");
pub const QUOTES_JSON: &str = include_str!("../fixtures/quotes.json");
pub const CONFIG_JSON: &str = include_str!("../fixtures/config.json");
pub const ALERTS_JSON: &str = include_str!("../fixtures/alerts.json");

/// Datetime of the last candle in `price_history.json`.
pub const LAST_CANDLE_MS: i64 = 1_709_791_200_000;

pub fn price_history(symbol: &str) -> PriceHistory {
    let mut history: PriceHistory =
        serde_json::from_str(PRICE_HISTORY_JSON).expect("fixture price history");
    history.symbol = symbol.to_uppercase();
    history
}

pub fn empty_history(symbol: &str) -> PriceHistory {
    PriceHistory {
        candles: Vec::new(),
        symbol: symbol.to_uppercase(),
        empty: true,
        previous_close: None,
        previous_close_date: None,
    }
}

pub fn quote_at(quote_time: i64) -> Quote {
    let mut fields = Map::new();
    fields.insert("lastPrice".into(), json!(169.42));
    let mut extra = Map::new();
    extra.insert("assetMainType".into(), json!("EQUITY"));
    Quote {
        quote: QuoteFields {
            quote_time,
            extra: fields,
        },
        extra,
    }
}

#[derive(Default)]
struct ProviderScript {
    histories: HashMap<String, VecDeque<Result<PriceHistory>>>,
    quotes: VecDeque<Result<HashMap<String, Quote>>>,
    history_calls: Vec<String>,
    quote_calls: Vec<Vec<String>>,
}

/// Provider answering from per-symbol and per-cycle scripts.
///
/// Clones share the same script, so a test can keep a handle after moving
/// one into the orchestrator. An exhausted history script answers
/// `DataUnavailable`; an exhausted quote script answers an empty map.
#[derive(Clone, Default)]
pub struct FakeProvider {
    script: Arc<Mutex<ProviderScript>>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_history(&self, symbol: &str, result: Result<PriceHistory>) -> &Self {
        self.script
            .lock()
            .unwrap()
            .histories
            .entry(symbol.to_string())
            .or_default()
            .push_back(result);
        self
    }

    pub fn push_quotes(&self, result: Result<HashMap<String, Quote>>) -> &Self {
        self.script.lock().unwrap().quotes.push_back(result);
        self
    }

    /// Queues one quote batch where every listed symbol was observed at `t`.
    pub fn push_quotes_at(&self, symbols: &[&str], t: i64) -> &Self {
        let quotes = symbols
            .iter()
            .map(|s| (s.to_string(), quote_at(t)))
            .collect();
        self.push_quotes(Ok(quotes))
    }

    pub fn history_calls(&self) -> Vec<String> {
        self.script.lock().unwrap().history_calls.clone()
    }

    pub fn quote_calls(&self) -> Vec<Vec<String>> {
        self.script.lock().unwrap().quote_calls.clone()
    }
}

impl MarketDataProvider for FakeProvider {
    async fn price_history(&self, symbol: &str, _frequency: &str, _period: &str) -> Result<PriceHistory> {
        let mut script = self.script.lock().unwrap();
        script.history_calls.push(symbol.to_string());
        script
            .histories
            .get_mut(symbol)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| {
                Err(TickercastError::DataUnavailable(format!(
                    "no history scripted for {symbol}"
                )))
            })
    }

    async fn quotes(&self, symbols: &[String]) -> Result<HashMap<String, Quote>> {
        let mut script = self.script.lock().unwrap();
        script.quote_calls.push(symbols.to_vec());
        script.quotes.pop_front().unwrap_or_else(|| Ok(HashMap::new()))
    }
}

/// Source whose list a test can swap between cycles.
#[derive(Clone, Default)]
pub struct FakeSource {
    subscriptions: Arc<Mutex<Option<Vec<Subscription>>>>,
}

impl FakeSource {
    pub fn new(subscriptions: Vec<Subscription>) -> Self {
        Self {
            subscriptions: Arc::new(Mutex::new(Some(subscriptions))),
        }
    }

    pub fn set(&self, subscriptions: Vec<Subscription>) {
        *self.subscriptions.lock().unwrap() = Some(subscriptions);
    }

    /// Makes subsequent listings fail.
    pub fn break_source(&self) {
        *self.subscriptions.lock().unwrap() = None;
    }
}

impl SubscriptionSource for FakeSource {
    async fn list_subscriptions(&self) -> Result<Vec<Subscription>> {
        self.subscriptions
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| TickercastError::DataUnavailable("source offline".into()))
    }
}

#[derive(Default)]
struct BusLog {
    sent: Vec<(String, String)>,
    failures: VecDeque<BusError>,
    attempts: usize,
}

/// Bus recording every delivered `(channel, payload)` pair, optionally
/// failing the next few sends.
#[derive(Clone, Default)]
pub struct RecordingBus {
    log: Arc<Mutex<BusLog>>,
}

impl RecordingBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next(&self, error: BusError, times: usize) {
        let mut log = self.log.lock().unwrap();
        for _ in 0..times {
            log.failures.push_back(error.clone());
        }
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.log.lock().unwrap().sent.clone()
    }

    pub fn channels(&self) -> Vec<String> {
        self.sent().into_iter().map(|(channel, _)| channel).collect()
    }

    /// Decoded payloads delivered to `channel`, in order.
    pub fn payloads(&self, channel: &str) -> Vec<serde_json::Value> {
        self.sent()
            .into_iter()
            .filter(|(c, _)| c == channel)
            .map(|(_, payload)| serde_json::from_str(&payload).unwrap())
            .collect()
    }

    pub fn attempts(&self) -> usize {
        self.log.lock().unwrap().attempts
    }
}

impl MessageBus for RecordingBus {
    async fn send(&mut self, channel: &str, payload: &str) -> std::result::Result<(), BusError> {
        let mut log = self.log.lock().unwrap();
        log.attempts += 1;
        if let Some(error) = log.failures.pop_front() {
            return Err(error);
        }
        log.sent.push((channel.to_string(), payload.to_string()));
        Ok(())
    }
}

pub type TestOrchestrator = StreamOrchestrator<FakeProvider, FakeSource, RecordingBus>;

/// Builds an orchestrator with no poll delay and no publish backoff.
pub fn orchestrator(
    provider: &FakeProvider,
    source: &FakeSource,
    bus: &RecordingBus,
    catch_up: CatchUp,
    shutdown: Shutdown,
) -> TestOrchestrator {
    StreamOrchestrator::new(
        provider.clone(),
        source.clone(),
        Publisher::new(bus.clone(), 3, Duration::ZERO),
        StreamSettings {
            poll_interval: Duration::ZERO,
            catch_up,
        },
        shutdown,
    )
}
