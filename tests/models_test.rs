//! Wire format tests for provider responses and published payloads.

mod common;

use std::collections::HashMap;

use common::{PRICE_HISTORY_JSON, QUOTES_JSON, quote_at};
use serde_json::Value;
use tickercast::models::{Payload, PriceHistory, Quote, Subscription};

#[test]
fn test_price_history_fixture_deserializes() {
    let history: PriceHistory = serde_json::from_str(PRICE_HISTORY_JSON).unwrap();

    assert_eq!(history.symbol, "AAPL");
    assert!(!history.empty);
    assert_eq!(history.candles.len(), 2);

    let first = &history.candles[0];
    assert_eq!(first.open, 171.06);
    assert_eq!(first.close, 169.12);
    assert_eq!(first.volume, 68_587_707);
    assert_eq!(first.datetime, 1_709_704_800_000);
    assert_eq!(history.previous_close_date, Some(1_709_618_400_000));
}

#[test]
fn test_price_history_without_optional_fields() {
    let history: PriceHistory =
        serde_json::from_str(r#"{"candles": [], "symbol": "MSFT"}"#).unwrap();

    assert!(history.candles.is_empty());
    assert!(!history.empty);
    assert!(history.last_candle().is_none());

    let json = serde_json::to_value(&history).unwrap();
    assert!(json.get("previousClose").is_none());
}

#[test]
fn test_quotes_fixture_keeps_unknown_fields() {
    let raw: HashMap<String, Value> = serde_json::from_str(QUOTES_JSON).unwrap();
    let quote: Quote = serde_json::from_value(raw["AAPL"].clone()).unwrap();

    assert_eq!(quote.quote_time(), 1_709_791_220_414);

    let back = serde_json::to_value(&quote).unwrap();
    assert_eq!(back, raw["AAPL"]);
}

#[test]
fn test_quote_without_quote_time_is_rejected() {
    let raw: HashMap<String, Value> = serde_json::from_str(QUOTES_JSON).unwrap();
    assert!(serde_json::from_value::<Quote>(raw["BOGUS"].clone()).is_err());
}

#[test]
fn test_patched_quote_changes_only_quote_time() {
    let original = quote_at(1_709_791_220_414);
    let patched = original.with_quote_time(1_709_791_260_000);

    assert_eq!(original.quote_time(), 1_709_791_220_414);
    assert_eq!(patched.quote_time(), 1_709_791_260_000);
    assert_eq!(patched.quote.extra, original.quote.extra);
    assert_eq!(patched.extra, original.extra);
}

#[test]
fn test_payload_serializes_as_inner_object() {
    let history: PriceHistory = serde_json::from_str(PRICE_HISTORY_JSON).unwrap();
    let as_payload = serde_json::to_value(Payload::History(history.clone())).unwrap();
    assert_eq!(as_payload, serde_json::to_value(&history).unwrap());

    let quote = quote_at(1_709_791_260_000);
    let as_payload = serde_json::to_value(Payload::Quote(quote.clone())).unwrap();
    assert_eq!(as_payload["quote"]["quoteTime"], 1_709_791_260_000_i64);
    assert_eq!(as_payload, serde_json::to_value(&quote).unwrap());
}

#[test]
fn test_subscription_deserializes_from_alert_shape() {
    let sub: Subscription =
        serde_json::from_str(r#"{"symbol": "aapl", "frequency": "1minute", "period": "1day"}"#)
            .unwrap();

    assert_eq!(sub, Subscription::new("aapl", "1minute", "1day"));
    assert_eq!(sub.to_string(), "(aapl, 1minute, 1day)");
    assert_eq!(sub.parsed_frequency().unwrap().step_ms(), 60_000);
}
