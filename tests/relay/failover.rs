//! Failover always rescans from the root candidate.

use std::thread;
use std::time::{Duration, Instant};

use broker_relay::{AnyEvent, DeliveryMode, InMemoryBroker, Message, Profile, WorkerState};

use crate::support::{settings, wait_until, worker};

#[test]
fn first_reachable_candidate_becomes_active() {
    let broker = InMemoryBroker::with_reachable(["nats://url2"]);
    let (mut worker, _queue) = worker(&broker, "events", &["nats://url1", "nats://url2"], 4);

    assert_eq!(worker.step(), WorkerState::Connected(DeliveryMode::Plain));
    assert_eq!(broker.connect_attempts(), vec!["nats://url1", "nats://url2"]);
    assert_eq!(worker.candidates().active_index(), Some(1));
}

#[test]
fn all_down_leaves_no_active_connection() {
    let broker = InMemoryBroker::new();
    let (mut worker, _queue) = worker(&broker, "events", &["nats://a", "nats://b", "nats://c"], 4);

    assert_eq!(worker.step(), WorkerState::Disconnected);
    assert!(worker.candidates().active().is_none());
    assert_eq!(worker.stats().connect_failures, 1);

    broker.bring_up("nats://c");
    assert_eq!(worker.step(), WorkerState::Connected(DeliveryMode::Plain));
    assert_eq!(worker.candidates().active_index(), Some(2));
}

#[test]
fn reconnect_prefers_recovered_root() {
    let broker = InMemoryBroker::with_reachable(["nats://b"]);
    let (mut worker, queue) = worker(&broker, "events", &["nats://a", "nats://b"], 4);
    worker.step();
    assert_eq!(worker.candidates().active_index(), Some(1));

    // Lose b, bring a back: the next publish fails and the rescan lands on a.
    broker.take_down("nats://b");
    broker.bring_up("nats://a");
    queue.try_push(Message::new("X", "{}")).unwrap();
    assert_eq!(worker.step(), WorkerState::Disconnected);

    worker.step();
    assert_eq!(worker.candidates().active_index(), Some(0));
    worker.step();
    assert_eq!(broker.published()[0].url, "nats://a");
    assert_eq!(broker.open_connections(), 1);
}

#[test]
fn stop_interrupts_reconnect_backoff() {
    let broker = InMemoryBroker::new();
    let profile = Profile::start(
        &settings("backoff", &["nats://down"]).with_reconnect_interval(Duration::from_secs(60)),
        broker.clone(),
        None,
        &AnyEvent,
    )
    .unwrap();

    // The first attempt failed and the worker is now sleeping.
    assert!(wait_until(|| !broker.connect_attempts().is_empty()));
    thread::sleep(Duration::from_millis(50));

    let started = Instant::now();
    let stats = profile.stop();
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(stats.connect_failures, 1);
    assert_eq!(broker.connect_attempts().len(), 1);
}
