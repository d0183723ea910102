//! Registry load, reload and shutdown.

use std::sync::Arc;

use broker_relay::{
    BridgeConfig, IncomingEvent, InMemoryBroker, LocalEventBus, ProfileError, Registry,
    StaticCatalog,
};
use serde_json::json;

use crate::support::{init_tracing, wait_until};

fn config(json: serde_json::Value) -> BridgeConfig {
    BridgeConfig::from_value(json).unwrap()
}

fn two_profiles() -> BridgeConfig {
    config(json!({
        "publishers": [
            {
                "name": "calls",
                "event_filter": "CHANNEL_CREATE,CHANNEL_HANGUP",
                "connections": [{"name": "a", "url": "nats://up"}]
            },
            {
                "name": "presence",
                "subject": "pbx.presence",
                "event_filter": "CUSTOM::sofia::register",
                "connections": [{"name": "a", "url": "nats://up"}]
            },
            {"subject": "broken"}
        ]
    }))
}

fn registry(broker: &InMemoryBroker, bus: &LocalEventBus) -> Registry<InMemoryBroker> {
    Registry::new(broker.clone())
        .with_source(Arc::new(bus.clone()))
        .with_catalog(Arc::new(StaticCatalog::new(["CHANNEL_CREATE", "CHANNEL_HANGUP"])))
}

#[test]
fn load_starts_valid_profiles_and_routes_events() {
    init_tracing();
    let broker = InMemoryBroker::with_reachable(["nats://up"]);
    let bus = LocalEventBus::new();
    let mut registry = registry(&broker, &bus);

    let report = registry.load(&two_profiles());
    assert_eq!(report.started, vec!["calls", "presence"]);
    assert_eq!(report.skipped.len(), 1);
    assert!(matches!(report.skipped[0].error, ProfileError::Config(_)));
    assert_eq!(bus.subscription_count(), 3);

    bus.dispatch(&IncomingEvent::new("CHANNEL_CREATE", json!({"uuid": "1"})));
    bus.dispatch(&IncomingEvent::custom("sofia::register", json!({"user": "1000"})));
    assert!(wait_until(|| broker.published().len() == 2));

    let mut subjects = broker.published_subjects();
    subjects.sort();
    assert_eq!(subjects, vec!["calls", "pbx.presence"]);

    let stats = registry.shutdown();
    assert_eq!(stats["calls"].messages_published, 1);
    assert_eq!(stats["presence"].messages_published, 1);
    assert_eq!(bus.subscription_count(), 0);
    assert_eq!(broker.open_connections(), 0);
}

#[test]
fn reload_rebuilds_from_scratch() {
    let broker = InMemoryBroker::with_reachable(["nats://up"]);
    let bus = LocalEventBus::new();
    let mut registry = registry(&broker, &bus);
    registry.load(&two_profiles());

    let report = registry.reload(&config(json!({
        "publishers": [{
            "name": "only",
            "event_filter": "CHANNEL_HANGUP",
            "connections": [{"name": "a", "url": "nats://up"}]
        }]
    })));

    assert_eq!(report.started, vec!["only"]);
    assert_eq!(registry.names().collect::<Vec<_>>(), vec!["only"]);
    assert_eq!(bus.subscription_count(), 1);
    assert!(registry.get("calls").is_none());
}

#[test]
fn duplicate_profile_in_config_is_skipped() {
    let broker = InMemoryBroker::with_reachable(["nats://up"]);
    let mut registry = Registry::new(broker);

    let report = registry.load(&config(json!({
        "publishers": [
            {"name": "p", "connections": [{"name": "a", "url": "nats://up"}]},
            {"name": "p", "connections": [{"name": "b", "url": "nats://up"}]}
        ]
    })));

    assert_eq!(report.started, vec!["p"]);
    assert!(matches!(
        report.skipped[0].error,
        ProfileError::Duplicate { .. }
    ));
}

#[test]
fn malformed_profile_does_not_block_the_others() {
    let broker = InMemoryBroker::with_reachable(["nats://up"]);
    let mut registry = Registry::new(broker);

    let report = registry.load(&config(json!({
        "publishers": [
            {"name": "good", "connections": [{"name": "a", "url": "nats://up"}]},
            {"name": "bad", "send_queue_size": "a hundred",
             "connections": [{"name": "a", "url": "nats://up"}]},
            {"name": "strings", "send_queue_size": "100", "jetstream_enabled": "false",
             "connections": [{"name": "a", "url": "nats://up"}]}
        ]
    })));

    assert_eq!(report.started, vec!["good", "strings"]);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].name.as_deref(), Some("bad"));
    assert_eq!(registry.get("strings").unwrap().queue_capacity(), 100);
}

#[test]
fn dropping_registry_joins_workers() {
    let broker = InMemoryBroker::with_reachable(["nats://up"]);
    {
        let mut registry = Registry::new(broker.clone());
        registry.load(&two_profiles());
        assert!(wait_until(|| broker.open_connections() == 2));
    }
    assert_eq!(broker.open_connections(), 0);
}
