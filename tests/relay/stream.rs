//! Durable stream provisioning through a running profile.

use broker_relay::broker::{RetentionPolicy, StorageType, StreamConfig};
use broker_relay::{AnyEvent, BrokerError, DeliveryMode, InMemoryBroker, Profile};
use serde_json::json;

use crate::support::{settings, wait_until};

#[test]
fn missing_stream_is_created_and_used() {
    let broker = InMemoryBroker::with_reachable(["nats://up"]);
    let profile = Profile::start(
        &settings("profilename", &["nats://up"]).with_stream("EVENTS"),
        broker.clone(),
        None,
        &AnyEvent,
    )
    .unwrap();

    assert!(wait_until(|| profile.delivery_mode() == Some(DeliveryMode::Stream)));
    let stream = broker.stream("EVENTS").unwrap();
    assert_eq!(stream.subjects, vec!["profilename.*"]);
    assert_eq!(stream.storage, StorageType::Memory);
    assert_eq!(stream.retention, RetentionPolicy::WorkQueue);

    profile.ingest("CHANNEL_CREATE", &json!({"id": 1}));
    assert!(wait_until(|| broker.published().len() == 1));
    let published = &broker.published()[0];
    assert_eq!(published.subject, "profilename.*.CHANNEL_CREATE");
    assert!(published.stream);

    profile.stop();
}

#[test]
fn existing_stream_gains_subject_once() {
    let broker = InMemoryBroker::with_reachable(["nats://up"]);
    broker.insert_stream(StreamConfig::work_queue("SHARED", "other.*"));

    let profile = Profile::start(
        &settings("orders", &["nats://up"]).with_stream("SHARED"),
        broker.clone(),
        None,
        &AnyEvent,
    )
    .unwrap();
    assert!(wait_until(|| profile.delivery_mode() == Some(DeliveryMode::Stream)));
    profile.stop();

    let profile = Profile::start(
        &settings("orders", &["nats://up"]).with_stream("SHARED"),
        broker.clone(),
        None,
        &AnyEvent,
    )
    .unwrap();
    assert!(wait_until(|| profile.delivery_mode() == Some(DeliveryMode::Stream)));
    profile.stop();

    assert_eq!(broker.stream("SHARED").unwrap().subjects, vec!["other.*", "orders.*"]);
    assert_eq!(broker.stream_calls().update, 1);
}

#[test]
fn provisioning_failure_falls_back_to_plain_publish() {
    let broker = InMemoryBroker::with_reachable(["nats://up"]);
    broker.fail_stream_requests(Some(BrokerError::Rejected("no jetstream".into())));

    let profile = Profile::start(
        &settings("calls", &["nats://up"]).with_stream("CALLS"),
        broker.clone(),
        None,
        &AnyEvent,
    )
    .unwrap();
    assert!(wait_until(|| profile.delivery_mode() == Some(DeliveryMode::Fallback)));

    profile.ingest("HANGUP", &json!({}));
    assert!(wait_until(|| broker.published().len() == 1));
    let published = &broker.published()[0];
    assert_eq!(published.subject, "calls");
    assert!(!published.stream);

    let stats = profile.stop();
    assert_eq!(stats.stream_failures, 1);
}
