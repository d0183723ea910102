use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use broker_relay::{
    Candidate, CandidateList, InMemoryBroker, InMemoryConnection, Message, ProfileSettings,
    PublisherWorker,
};
use broker_relay::queue::BoundedQueue;

pub const POLL: Duration = Duration::from_millis(10);

pub fn init_tracing() {
    broker_relay::telemetry::init("broker_relay=debug");
}

/// Profile settings with short timeouts and one connection per url.
pub fn settings(name: &str, urls: &[&str]) -> ProfileSettings {
    let mut settings = ProfileSettings::new(name)
        .with_poll_timeout(POLL)
        .with_reconnect_interval(Duration::from_millis(10));
    for (i, url) in urls.iter().enumerate() {
        settings = settings.with_connection(format!("conn{i}"), [*url]);
    }
    settings
}

/// A worker driven by hand through `step`.
pub fn worker(
    broker: &InMemoryBroker,
    subject: &str,
    urls: &[&str],
    capacity: usize,
) -> (PublisherWorker<InMemoryBroker>, Arc<BoundedQueue<Message>>) {
    let mut candidates: CandidateList<InMemoryConnection> = CandidateList::new();
    for (i, url) in urls.iter().enumerate() {
        candidates.push(Candidate::new(format!("conn{i}"), [*url]));
    }
    let queue = Arc::new(BoundedQueue::new(capacity));
    let shared = Arc::clone(&queue);
    let worker = PublisherWorker::new(subject, subject, broker.clone(), candidates, shared)
        .with_poll_timeout(POLL)
        .with_reconnect_interval(Duration::from_millis(1));
    (worker, queue)
}

/// Poll `done` until it holds or five seconds pass.
pub fn wait_until(mut done: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if done() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}
