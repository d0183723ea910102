//! Configuration files.

use std::fs;
use std::time::Duration;

use broker_relay::{BridgeConfig, ConfigError};

#[test]
fn loads_profiles_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("relay.json");
    fs::write(
        &path,
        r#"{
            "publishers": [
                {
                    "name": "calls",
                    "subject": "pbx.calls",
                    "stream_enabled": true,
                    "circuit_breaker_ms": 2500,
                    "connections": [{"name": "local", "url": "nats://127.0.0.1:4222"}]
                },
                {"subject": "nameless"}
            ]
        }"#,
    )
    .unwrap();

    let config = BridgeConfig::from_path(&path).unwrap();
    assert_eq!(config.publishers.len(), 2);
    assert!(config.publishers[1].resolve().is_err());

    let calls = config.publishers[0].resolve().unwrap();
    assert_eq!(calls.stream.name(), "calls");
    assert_eq!(calls.stream.subject(), "pbx.calls.*");
    assert_eq!(calls.breaker_duration, Duration::from_millis(2500));
    assert_eq!(calls.connections[0].urls, vec!["nats://127.0.0.1:4222"]);
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = BridgeConfig::from_path(dir.path().join("absent.json"));
    assert!(matches!(result, Err(ConfigError::Io { .. })));
}
