//! Redis pub/sub integration tests.
//!
//! These tests talk to a real Redis server (`REDIS_URL`, default
//! `redis://localhost:6379/0`).
//! Run with: `cargo test --features integration-tests`

#![cfg(feature = "integration-tests")]

mod common;

use std::time::Duration;

use futures_util::StreamExt;
use tickercast::TickercastError;
use tickercast::models::{Payload, Subscription};
use tickercast::publisher::{Publisher, RedisBus};
use tokio_test::assert_ok;

use common::price_history;

fn redis_url() -> String {
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379/0".to_string())
}

#[tokio::test]
async fn test_connect_to_redis() {
    assert_ok!(RedisBus::connect(&redis_url()).await);
}

#[tokio::test]
async fn test_published_history_reaches_subscriber() {
    let subscription = Subscription::new("aapl", "1minute", "1day");
    let channel = subscription.channel_name();

    let client = redis::Client::open(redis_url()).expect("valid redis url");
    let mut pubsub = client
        .get_async_pubsub()
        .await
        .expect("Failed to open pubsub connection");
    pubsub.subscribe(&channel).await.expect("Failed to subscribe");

    let bus = RedisBus::connect(&redis_url()).await.expect("Failed to connect");
    let mut publisher = Publisher::with_defaults(bus);
    let history = price_history("aapl");
    publisher
        .publish(&channel, &Payload::History(history.clone()))
        .await
        .expect("Failed to publish");

    let mut messages = pubsub.on_message();
    let message = tokio::time::timeout(Duration::from_secs(5), messages.next())
        .await
        .expect("Timed out waiting for message")
        .expect("pubsub stream ended");

    assert_eq!(message.get_channel_name(), channel);
    let payload: String = message.get_payload().unwrap();
    let received: serde_json::Value = serde_json::from_str(&payload).unwrap();
    assert_eq!(received, serde_json::to_value(&history).unwrap());
}

#[tokio::test]
async fn test_unreachable_redis_fails_to_connect() {
    let Err(err) = RedisBus::connect("redis://127.0.0.1:1/0").await else {
        panic!("connected to a closed port");
    };
    assert!(matches!(err, TickercastError::PublishConnection { .. }));
}
