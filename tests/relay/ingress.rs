//! Ingress never blocks; overflow trips the breaker.

use std::thread;
use std::time::{Duration, Instant};

use broker_relay::{AnyEvent, InMemoryBroker, IngestOutcome, Profile};
use serde_json::json;

use crate::support::{init_tracing, settings};

#[test]
fn overflow_drops_third_event_and_trips_breaker() {
    init_tracing();
    // Nothing is reachable, so nothing drains the queue.
    let profile = Profile::start(
        &settings("burst", &["nats://down"])
            .with_queue_capacity(2)
            .with_breaker_duration(Duration::from_secs(30)),
        InMemoryBroker::new(),
        None,
        &AnyEvent,
    )
    .unwrap();

    assert_eq!(profile.ingest("A", &json!(1)), IngestOutcome::Queued);
    assert_eq!(profile.ingest("A", &json!(2)), IngestOutcome::Queued);
    assert_eq!(profile.ingest("A", &json!(3)), IngestOutcome::Overflow);

    assert!(profile.breaker_open());
    assert_eq!(profile.queue_len(), 2);
    assert_eq!(profile.ingest("A", &json!(4)), IngestOutcome::Suppressed);

    let stats = profile.stop();
    assert_eq!(stats.messages_discarded, 2);
}

#[test]
fn full_queue_does_not_block_callers() {
    let profile = Profile::start(
        &settings("fast", &["nats://down"]).with_queue_capacity(1),
        InMemoryBroker::new(),
        None,
        &AnyEvent,
    )
    .unwrap();

    let started = Instant::now();
    for i in 0..10_000 {
        profile.ingest("A", &json!(i));
    }
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(profile.queue_len(), 1);
}

#[test]
fn stopped_profile_rejects_events() {
    let broker = InMemoryBroker::with_reachable(["nats://up"]);
    let profile = Profile::start(&settings("p", &["nats://up"]), broker, None, &AnyEvent).unwrap();
    let ingress = profile.ingress();

    profile.stop();
    assert_eq!(ingress.ingest("A", &json!({})), IngestOutcome::NotRunning);
}

#[test]
fn concurrent_producers_never_exceed_capacity() {
    let profile = Profile::start(
        &settings("crowd", &["nats://down"])
            .with_queue_capacity(16)
            .with_breaker_duration(Duration::from_secs(30)),
        InMemoryBroker::new(),
        None,
        &AnyEvent,
    )
    .unwrap();

    let producers: Vec<_> = (0..8)
        .map(|producer| {
            let ingress = profile.ingress();
            thread::spawn(move || {
                (0..500)
                    .map(|i| ingress.ingest("TICK", &json!({"producer": producer, "i": i})))
                    .filter(|outcome| outcome.is_queued())
                    .count()
            })
        })
        .collect();

    let queued: usize = producers.into_iter().map(|p| p.join().unwrap()).sum();

    assert!(profile.queue_len() <= profile.queue_capacity());
    assert_eq!(queued, profile.queue_len());
    assert!(profile.breaker_open());

    let stats = profile.stop();
    assert_eq!(stats.messages_discarded, queued);
}
