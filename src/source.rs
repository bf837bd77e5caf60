//! Where the set of active subscriptions comes from.
//!
//! The poll loop asks its [`SubscriptionSource`] for the current list at the
//! top of every cycle, so sources backed by external storage pick up edits
//! without a restart.

use std::future::Future;
use std::path::PathBuf;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::{AppConfig, SourceKind};
use crate::models::Subscription;
use crate::{Result, TickercastError};

/// Supplies the ordered list of subscriptions to poll.
pub trait SubscriptionSource {
    /// Returns the current subscriptions.
    ///
    /// # Errors
    ///
    /// Returns [`TickercastError::DataUnavailable`] if the backing store
    /// cannot be read.
    fn list_subscriptions(&self) -> impl Future<Output = Result<Vec<Subscription>>> + Send;
}

/// One stored alert. Only the subscription fields are streamed; `name` and
/// `value` are validated so a corrupt record is skipped as a whole.
#[derive(Debug, Deserialize)]
struct AlertRecord {
    name: String,
    value: f64,
    symbol: String,
    frequency: String,
    period: String,
}

impl AlertRecord {
    fn validate(&self) -> std::result::Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("empty alert name".to_string());
        }
        if !(0.0..=100.0).contains(&self.value) {
            return Err(format!("value {} outside 0..=100", self.value));
        }
        if self.symbol.trim().is_empty() {
            return Err("empty symbol".to_string());
        }
        Ok(())
    }

    fn into_subscription(self) -> Subscription {
        Subscription::new(self.symbol, self.frequency, self.period)
    }
}

/// Alert records stored as a JSON array in a file, re-read on every call.
#[derive(Debug, Clone)]
pub struct AlertsFile {
    path: PathBuf,
}

impl AlertsFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Parses the file contents, skipping records that fail to decode or
    /// validate.
    fn parse(&self, contents: &str) -> Result<Vec<Subscription>> {
        let records: Vec<serde_json::Value> = serde_json::from_str(contents).map_err(|e| {
            TickercastError::DataUnavailable(format!(
                "alerts file {} is not a JSON array: {e}",
                self.path.display()
            ))
        })?;

        let mut subscriptions = Vec::with_capacity(records.len());
        for (index, raw) in records.into_iter().enumerate() {
            let record = match serde_json::from_value::<AlertRecord>(raw) {
                Ok(record) => record,
                Err(e) => {
                    warn!(index, "Skipping malformed alert record: {e}");
                    continue;
                }
            };
            if let Err(reason) = record.validate() {
                warn!(index, name = %record.name, "Skipping invalid alert record: {reason}");
                continue;
            }
            subscriptions.push(record.into_subscription());
        }
        Ok(subscriptions)
    }
}

impl SubscriptionSource for AlertsFile {
    async fn list_subscriptions(&self) -> Result<Vec<Subscription>> {
        let contents = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            TickercastError::DataUnavailable(format!(
                "failed to read alerts file {}: {e}",
                self.path.display()
            ))
        })?;

        let subscriptions = self.parse(&contents)?;
        debug!(count = subscriptions.len(), "Loaded alert subscriptions");
        Ok(subscriptions)
    }
}

/// A fixed list of subscriptions from the config file.
#[derive(Debug, Clone, Default)]
pub struct StaticSubscriptions {
    subscriptions: Vec<Subscription>,
}

impl StaticSubscriptions {
    pub fn new(subscriptions: Vec<Subscription>) -> Self {
        Self { subscriptions }
    }
}

impl SubscriptionSource for StaticSubscriptions {
    async fn list_subscriptions(&self) -> Result<Vec<Subscription>> {
        Ok(self.subscriptions.clone())
    }
}

/// Every subscription source this binary can be configured with.
#[derive(Debug, Clone)]
pub enum Source {
    Alerts(AlertsFile),
    Static(StaticSubscriptions),
}

impl Source {
    /// Builds the source selected by `config.subscription_source`.
    pub fn from_config(config: &AppConfig) -> Self {
        match config.subscription_source {
            SourceKind::Alerts => Source::Alerts(AlertsFile::new(&config.alerts.path)),
            SourceKind::Static => {
                Source::Static(StaticSubscriptions::new(config.subscriptions.clone()))
            }
        }
    }
}

impl SubscriptionSource for Source {
    async fn list_subscriptions(&self) -> Result<Vec<Subscription>> {
        match self {
            Source::Alerts(alerts) => alerts.list_subscriptions().await,
            Source::Static(fixed) => fixed.list_subscriptions().await,
        }
    }
}
