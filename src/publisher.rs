//! Publishing stream items to the pub/sub bus.
//!
//! [`Publisher`] serializes a payload once and hands it to a [`MessageBus`],
//! retrying connection failures a bounded number of times. [`RedisBus`] is
//! the production bus.

use std::future::Future;
use std::time::Duration;

use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::{Result, TickercastError};

/// Default number of send attempts before a connection failure is fatal.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default pause between send attempts.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Why a single send to the bus failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BusError {
    /// The bus could not be reached; worth retrying.
    #[error("connection error: {0}")]
    Connection(String),
    /// The bus refused the message; retrying will not help.
    #[error("rejected: {0}")]
    Rejected(String),
}

/// A channel-addressed message sink.
pub trait MessageBus {
    /// Sends one already-serialized message to `channel`.
    fn send(
        &mut self,
        channel: &str,
        payload: &str,
    ) -> impl Future<Output = std::result::Result<(), BusError>> + Send;
}

/// Publishes serialized payloads with bounded retry on connection failures.
pub struct Publisher<B> {
    bus: B,
    max_attempts: u32,
    retry_delay: Duration,
}

impl<B: MessageBus> Publisher<B> {
    /// Creates a publisher. `max_attempts` is clamped to at least one.
    #[must_use]
    pub fn new(bus: B, max_attempts: u32, retry_delay: Duration) -> Self {
        Self {
            bus,
            max_attempts: max_attempts.max(1),
            retry_delay,
        }
    }

    /// Creates a publisher with 3 attempts spaced 500ms apart.
    #[must_use]
    pub fn with_defaults(bus: B) -> Self {
        Self::new(bus, DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY)
    }

    /// Returns the underlying bus.
    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Serializes `payload` to JSON and sends it to `channel`.
    ///
    /// # Errors
    ///
    /// - [`TickercastError::Json`] if serialization fails (never retried).
    /// - [`TickercastError::Publish`] if the bus rejects the message (never retried).
    /// - [`TickercastError::PublishConnection`] once every attempt has failed
    ///   to reach the bus.
    pub async fn publish<T: Serialize + ?Sized>(&mut self, channel: &str, payload: &T) -> Result<()> {
        let json = serde_json::to_string(payload)?;
        self.publish_raw(channel, &json).await
    }

    /// Sends an already-serialized payload to `channel`.
    ///
    /// # Errors
    ///
    /// Same as [`Publisher::publish`], minus serialization.
    pub async fn publish_raw(&mut self, channel: &str, json: &str) -> Result<()> {
        let mut attempt = 1;

        loop {
            match self.bus.send(channel, json).await {
                Ok(()) => {
                    debug!(channel, attempt, bytes = json.len(), "Published message");
                    return Ok(());
                }
                Err(BusError::Rejected(reason)) => {
                    error!(channel, %reason, "Bus rejected message");
                    return Err(TickercastError::Publish(reason));
                }
                Err(BusError::Connection(reason)) if attempt >= self.max_attempts => {
                    error!(channel, attempt, %reason, "Giving up on publish");
                    return Err(TickercastError::PublishConnection {
                        channel: channel.to_string(),
                        attempts: attempt,
                        reason,
                    });
                }
                Err(BusError::Connection(reason)) => {
                    warn!(
                        channel,
                        attempt,
                        max_attempts = self.max_attempts,
                        %reason,
                        "Publish failed, retrying"
                    );
                    tokio::time::sleep(self.retry_delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// Redis pub/sub bus backed by an auto-reconnecting connection.
#[derive(Clone)]
pub struct RedisBus {
    connection: ConnectionManager,
}

impl RedisBus {
    /// Connects to the Redis server at `url`.
    ///
    /// # Errors
    ///
    /// Returns [`TickercastError::PublishConnection`] if the URL is invalid
    /// or the server cannot be reached.
    pub async fn connect(url: &str) -> Result<Self> {
        info!("Connecting to Redis...");

        let unreachable = |e: redis::RedisError| TickercastError::PublishConnection {
            channel: "<connect>".to_string(),
            attempts: 1,
            reason: e.to_string(),
        };

        let client = redis::Client::open(url).map_err(unreachable)?;
        let connection = ConnectionManager::new(client).await.map_err(unreachable)?;

        info!("Redis connection established");
        Ok(Self { connection })
    }
}

impl MessageBus for RedisBus {
    async fn send(&mut self, channel: &str, payload: &str) -> std::result::Result<(), BusError> {
        let _: i64 = self
            .connection
            .publish(channel, payload)
            .await
            .map_err(classify_redis_error)?;

        Ok(())
    }
}

/// Splits Redis failures into retryable connection problems and the rest.
fn classify_redis_error(e: redis::RedisError) -> BusError {
    if e.is_io_error() || e.is_connection_refusal() || e.is_connection_dropped() || e.is_timeout()
    {
        BusError::Connection(e.to_string())
    } else {
        BusError::Rejected(e.to_string())
    }
}
