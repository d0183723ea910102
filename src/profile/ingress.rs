use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{error, trace, warn};

use crate::breaker::CircuitBreaker;
use crate::message::{IncomingEvent, Message};
use crate::queue::BoundedQueue;

/// What happened to one ingested event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// Waiting for the worker
    Queued,
    /// The profile is shutting down
    NotRunning,
    /// The circuit breaker is open
    Suppressed,
    /// The queue was full; the event was dropped and the breaker tripped
    Overflow,
    /// The payload could not be serialized
    Unserializable,
}

impl IngestOutcome {
    pub fn is_queued(self) -> bool {
        self == IngestOutcome::Queued
    }
}

/// Producer side of a profile, shared with event-bus handlers.
///
/// Never blocks: every path is a flag check, a timestamp compare, or a
/// non-blocking push.
pub struct Ingress {
    profile: String,
    running: Arc<AtomicBool>,
    breaker: CircuitBreaker,
    queue: Arc<BoundedQueue<Message>>,
}

impl Ingress {
    pub(crate) fn new(
        profile: impl Into<String>,
        running: Arc<AtomicBool>,
        breaker: CircuitBreaker,
        queue: Arc<BoundedQueue<Message>>,
    ) -> Self {
        Self {
            profile: profile.into(),
            running,
            breaker,
            queue,
        }
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn queue(&self) -> &BoundedQueue<Message> {
        &self.queue
    }

    /// Serialize `payload` and queue it for delivery.
    pub fn ingest<T: Serialize + ?Sized>(&self, event_name: &str, payload: &T) -> IngestOutcome {
        self.ingest_at(Instant::now(), event_name, payload)
    }

    /// Like `ingest`, with an explicit clock reading.
    pub fn ingest_at<T: Serialize + ?Sized>(
        &self,
        now: Instant,
        event_name: &str,
        payload: &T,
    ) -> IngestOutcome {
        self.offer_at(now, event_name, || Message::encode(event_name, payload))
    }

    /// Event-bus callback.
    pub fn accept(&self, event: &IncomingEvent) -> IngestOutcome {
        self.accept_at(Instant::now(), event)
    }

    /// Like `accept`, with an explicit clock reading.
    pub fn accept_at(&self, now: Instant, event: &IncomingEvent) -> IngestOutcome {
        self.offer_at(now, &event.name, || Message::from_event(event))
    }

    /// Gate, then serialize, then push. Serialization is skipped while gated.
    fn offer_at<F>(&self, now: Instant, event_name: &str, encode: F) -> IngestOutcome
    where
        F: FnOnce() -> Result<Message, serde_json::Error>,
    {
        if !self.is_running() {
            trace!(profile = %self.profile, event = event_name, "profile not running, ignoring");
            return IngestOutcome::NotRunning;
        }
        if self.breaker.is_open_at(now) {
            trace!(profile = %self.profile, event = event_name, "circuit breaker open, ignoring");
            return IngestOutcome::Suppressed;
        }

        let message = match encode() {
            Ok(message) => message,
            Err(err) => {
                warn!(
                    profile = %self.profile,
                    event = event_name,
                    error = %err,
                    "failed to serialize event"
                );
                return IngestOutcome::Unserializable;
            }
        };

        match self.queue.try_push(message) {
            Ok(()) => IngestOutcome::Queued,
            Err(full) => {
                self.breaker.trip_at(now);
                error!(
                    profile = %self.profile,
                    event = full.item.event_name(),
                    capacity = full.capacity,
                    breaker_ms = self.breaker.duration().as_millis() as u64,
                    "send queue full, dropping events until the circuit breaker resets"
                );
                IngestOutcome::Overflow
            }
        }
    }
}
