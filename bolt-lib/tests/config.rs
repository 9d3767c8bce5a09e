//! Tests for session configuration loading

mod common;

use bolt_lib::RetryPolicy;
use common::*;

#[test]
fn test_defaults() {
    let config = SessionConfig::default();
    assert_eq!(config.connect_timeout, Duration::from_secs(10));
    assert_eq!(config.ack_timeout, Duration::from_secs(1));
    assert_eq!(config.ack_mode, AckMode::Response);
    assert_eq!(config.retry, RetryPolicy { max_retries: 0 });
    assert!(!config.wake_on_connect);
}

#[test]
fn test_partial_json_falls_back_to_defaults() {
    let json = r#"{ "ack_mode": "write_confirmed", "retry": { "max_retries": 3 }, "wake_on_connect": true }"#;
    let config: SessionConfig = serde_json::from_str(json).expect("Failed to parse config");

    assert_eq!(config.ack_mode, AckMode::WriteConfirmed);
    assert_eq!(config.retry.max_retries, 3);
    assert!(config.wake_on_connect);
    assert_eq!(config.ack_timeout, SessionConfig::default().ack_timeout);
}

#[test]
fn test_config_survives_serialization() {
    let config = fast_config().with_retries(1).with_ack_mode(AckMode::WriteConfirmed);
    let json = serde_json::to_string(&config).unwrap();
    let parsed: SessionConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, config);
}

#[test]
fn test_device_record_serializes_flat_address() {
    let record = bolt("AA:BB", "SB-1A2B", -42);
    let value = serde_json::to_value(&record).unwrap();
    assert_eq!(value["address"], "AA:BB");
    assert_eq!(value["rssi"], -42);
    assert_eq!(value["service"], "00010001-574f-4f20-5370-6865726f2121");
}
