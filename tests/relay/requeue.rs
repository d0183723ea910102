//! Transport failures close the connection and requeue the message once.

use broker_relay::{BrokerError, InMemoryBroker, Message, WorkerState};

use crate::support::worker;

#[test]
fn transport_failure_requeues_at_head() {
    let broker = InMemoryBroker::with_reachable(["nats://up"]);
    let (mut worker, queue) = worker(&broker, "events", &["nats://up"], 8);
    worker.step();

    queue.try_push(Message::new("FIRST", "1")).unwrap();
    queue.try_push(Message::new("SECOND", "2")).unwrap();
    broker.fail_next_publish(BrokerError::Transport("broken pipe".into()));

    assert_eq!(worker.step(), WorkerState::Disconnected);
    assert!(worker.candidates().active().is_none());
    assert_eq!(queue.len(), 2);
    assert_eq!(worker.stats().messages_requeued, 1);

    // Reconnect, then the failed message goes out first.
    worker.step();
    worker.step();
    worker.step();
    assert_eq!(
        broker
            .published()
            .iter()
            .map(|p| p.payload.as_str())
            .collect::<Vec<_>>(),
        vec!["1", "2"]
    );
}

#[test]
fn failed_message_is_delivered_exactly_once() {
    let broker = InMemoryBroker::with_reachable(["nats://up"]);
    let (mut worker, queue) = worker(&broker, "events", &["nats://up"], 4);
    worker.step();

    queue.try_push(Message::new("ONLY", "x")).unwrap();
    broker.fail_next_publish(BrokerError::ConnectionClosed);
    worker.step();
    assert_eq!(queue.len(), 1);

    for _ in 0..4 {
        worker.step();
    }
    assert_eq!(broker.published().len(), 1);
    assert!(queue.is_empty());
    assert_eq!(worker.stats().messages_published, 1);
    assert_eq!(worker.stats().messages_dropped, 0);
}

#[test]
fn non_transport_failure_drops_without_disconnect() {
    let broker = InMemoryBroker::with_reachable(["nats://up"]);
    let (mut worker, queue) = worker(&broker, "events", &["nats://up"], 4);
    worker.step();

    queue.try_push(Message::new("BAD", "x")).unwrap();
    broker.fail_next_publish(BrokerError::Rejected("payload too large".into()));

    worker.step();
    assert!(worker.candidates().is_connected());
    assert!(queue.is_empty());
    assert_eq!(worker.stats().messages_dropped, 1);
}
