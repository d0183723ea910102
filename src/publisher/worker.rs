//! The per-profile delivery loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::state::{DeliveryMode, StateCell, WorkerState};
use crate::broker::{Broker, BrokerConnection, BrokerError, ConnectOptions};
use crate::connection::CandidateList;
use crate::message::Message;
use crate::queue::BoundedQueue;
use crate::stream::{self, StreamSettings};

/// How long a pop waits before the loop re-checks the running flag.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(1);

/// Default pause between failed reconnect rounds.
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_millis(1000);

/// Longest uninterrupted sleep while waiting to reconnect.
const SLEEP_SLICE: Duration = Duration::from_millis(50);

/// Statistics from a publisher worker.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WorkerStats {
    pub messages_published: usize,
    /// Messages put back after a transport failure
    pub messages_requeued: usize,
    /// Messages given up on (non-transport failure, or requeue hit a full queue)
    pub messages_dropped: usize,
    /// Messages still queued when the profile was torn down
    pub messages_discarded: usize,
    pub connects: usize,
    pub connect_failures: usize,
    pub stream_failures: usize,
    pub polls: usize,
}

/// Outcome of a single send attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SendError {
    /// No active connection; the message is kept for the next cycle
    #[error("not initialized")]
    NotInitialized,
    /// The connection failed; it is closed and the message requeued once
    #[error("transport error: {0}")]
    Transport(String),
    /// Anything else; the message is dropped
    #[error("send failed: {0}")]
    Other(String),
}

impl From<BrokerError> for SendError {
    fn from(err: BrokerError) -> Self {
        if err.is_transport() {
            SendError::Transport(err.to_string())
        } else {
            SendError::Other(err.to_string())
        }
    }
}

/// Publisher worker for one profile.
///
/// The worker is the only owner of the connection candidates and the stream
/// readiness flag; the queue and running flag are shared with the profile's
/// ingress side.
///
/// Each iteration of the loop does one of:
/// - **disconnected**: failover open; on success provision the stream (if
///   enabled), on failure sleep `reconnect_interval`
/// - **connected**: pop one message (waiting at most `poll_timeout`) and send it
pub struct PublisherWorker<B: Broker> {
    profile: String,
    subject: String,
    broker: B,
    options: ConnectOptions,
    candidates: CandidateList<B::Connection>,
    stream: StreamSettings,
    stream_ready: bool,
    queue: Arc<BoundedQueue<Message>>,
    running: Arc<AtomicBool>,
    state: Arc<StateCell>,
    reconnect_interval: Duration,
    poll_timeout: Duration,
    in_flight: Option<Message>,
    stats: WorkerStats,
}

impl<B: Broker> PublisherWorker<B> {
    /// Create a worker publishing on `subject` with the stream feature off.
    pub fn new(
        profile: impl Into<String>,
        subject: impl Into<String>,
        broker: B,
        candidates: CandidateList<B::Connection>,
        queue: Arc<BoundedQueue<Message>>,
    ) -> Self {
        let profile = profile.into();
        let subject = subject.into();
        Self {
            options: ConnectOptions::for_profile(profile.clone()),
            stream: StreamSettings::disabled(profile.clone(), &subject),
            profile,
            subject,
            broker,
            candidates,
            stream_ready: false,
            queue,
            running: Arc::new(AtomicBool::new(true)),
            state: Arc::new(StateCell::new()),
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            in_flight: None,
            stats: WorkerStats::default(),
        }
    }

    /// Use the given durable stream settings.
    pub fn with_stream(mut self, stream: StreamSettings) -> Self {
        self.stream = stream;
        self
    }

    /// Share an existing running flag (cleared to stop the loop).
    pub fn with_running(mut self, running: Arc<AtomicBool>) -> Self {
        self.running = running;
        self
    }

    /// Publish state changes into an existing cell.
    pub fn with_state(mut self, state: Arc<StateCell>) -> Self {
        self.state = state;
        self
    }

    pub fn with_reconnect_interval(mut self, interval: Duration) -> Self {
        self.reconnect_interval = interval;
        self
    }

    pub fn with_poll_timeout(mut self, timeout: Duration) -> Self {
        self.poll_timeout = timeout;
        self
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    pub fn running(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn stats(&self) -> &WorkerStats {
        &self.stats
    }

    pub fn candidates(&self) -> &CandidateList<B::Connection> {
        &self.candidates
    }

    pub fn stream_ready(&self) -> bool {
        self.stream_ready
    }

    /// Message held back after a "not initialized" send.
    pub fn in_flight(&self) -> Option<&Message> {
        self.in_flight.as_ref()
    }

    /// Current state, derived from connection and stream readiness.
    pub fn state(&self) -> WorkerState {
        if !self.candidates.is_connected() {
            WorkerState::Disconnected
        } else if !self.stream.enabled() {
            WorkerState::Connected(DeliveryMode::Plain)
        } else if self.stream_ready {
            WorkerState::Connected(DeliveryMode::Stream)
        } else {
            WorkerState::Connected(DeliveryMode::Fallback)
        }
    }

    fn publish_state(&self) -> WorkerState {
        let state = self.state();
        self.state.store(state);
        state
    }

    /// Run until the running flag is cleared.
    pub fn run(mut self) -> WorkerStats {
        info!(profile = %self.profile, "publisher worker started");

        while self.running.load(Ordering::Acquire) {
            self.step();
        }

        if let Some(message) = self.in_flight.take() {
            debug!(
                profile = %self.profile,
                event = message.event_name(),
                "aborting in-flight message"
            );
            self.stats.messages_dropped += 1;
        }
        self.candidates.close_all();
        self.stream_ready = false;
        self.state.store(WorkerState::Stopped);

        info!(profile = %self.profile, "publisher worker stopped");
        self.stats
    }

    /// One loop iteration.
    pub fn step(&mut self) -> WorkerState {
        self.stats.polls += 1;

        if !self.candidates.is_connected() {
            self.reconnect();
            return self.publish_state();
        }

        let message = match self.in_flight.take() {
            Some(message) => message,
            None => match self.queue.pop_timeout(self.poll_timeout) {
                Some(message) => message,
                None => return self.publish_state(),
            },
        };

        self.deliver(message);
        self.publish_state()
    }

    fn reconnect(&mut self) {
        warn!(profile = %self.profile, "no connection - reconnecting");
        self.stream_ready = false;

        match self.candidates.open(&self.broker, &self.options) {
            Ok(_) => {
                self.stats.connects += 1;
                if self.stream.enabled() {
                    self.provision_stream();
                }
                self.warn_if_fallback();
            }
            Err(err) => {
                self.stats.connect_failures += 1;
                self.state.store(WorkerState::Disconnected);
                warn!(
                    profile = %self.profile,
                    error = %err,
                    retry_in_ms = self.reconnect_interval.as_millis() as u64,
                    "failed to connect, sleeping"
                );
                self.sleep_while_running(self.reconnect_interval);
            }
        }
    }

    fn warn_if_fallback(&self) {
        if self.state() == WorkerState::Connected(DeliveryMode::Fallback) {
            warn!(
                profile = %self.profile,
                stream = self.stream.name(),
                subject = %self.subject,
                "stream not ready, falling back to plain publish"
            );
        }
    }

    fn provision_stream(&mut self) {
        let Some(conn) = self.candidates.connection() else {
            return;
        };

        match stream::ensure(conn, &self.stream) {
            Ok(outcome) => {
                self.stream_ready = true;
                info!(
                    profile = %self.profile,
                    stream = self.stream.name(),
                    ?outcome,
                    "stream connected"
                );
            }
            Err(err) => {
                self.stats.stream_failures += 1;
                warn!(profile = %self.profile, error = %err, "stream provisioning failed");
            }
        }
    }

    /// Send a message on the active connection.
    pub fn send(&self, message: &Message) -> Result<(), SendError> {
        let conn = self
            .candidates
            .connection()
            .ok_or(SendError::NotInitialized)?;

        let result = if self.stream_ready {
            let subject = self.stream.publish_subject(message.event_name());
            debug!(
                profile = %self.profile,
                event = message.event_name(),
                subject = %subject,
                "sending event to stream"
            );
            conn.stream_publish(&subject, message.payload_bytes())
        } else {
            conn.publish(&self.subject, message.payload_bytes())
        };

        result.map_err(SendError::from)
    }

    fn deliver(&mut self, message: Message) {
        let via_stream = self.stream_ready;
        match self.send(&message) {
            Ok(()) => {
                self.stats.messages_published += 1;
            }
            Err(SendError::NotInitialized) => {
                warn!(profile = %self.profile, "send failed with 'not initialized'");
                self.in_flight = Some(message);
            }
            Err(SendError::Transport(reason)) => {
                error!(
                    profile = %self.profile,
                    connection = self.candidates.active().map(|c| c.name()).unwrap_or("-"),
                    subject = %self.subject,
                    event = message.event_name(),
                    %reason,
                    "send failed with transport error"
                );
                debug!(profile = %self.profile, payload = message.payload(), "failed message");

                self.candidates.close();
                self.stream_ready = false;
                self.state.store(WorkerState::Disconnected);

                match self.queue.try_requeue(message) {
                    Ok(()) => self.stats.messages_requeued += 1,
                    Err(full) => {
                        error!(
                            profile = %self.profile,
                            capacity = full.capacity,
                            event = full.item.event_name(),
                            "could not requeue message, dropping it"
                        );
                        self.stats.messages_dropped += 1;
                    }
                }
            }
            Err(SendError::Other(reason)) => {
                warn!(
                    profile = %self.profile,
                    event = message.event_name(),
                    %reason,
                    "send failed, dropping message"
                );
                self.stats.messages_dropped += 1;

                // The stream may have been removed or reconfigured on the broker.
                if via_stream {
                    self.stream_ready = false;
                    self.provision_stream();
                    self.warn_if_fallback();
                }
            }
        }
    }

    fn sleep_while_running(&self, duration: Duration) {
        let deadline = Instant::now() + duration;
        while self.running.load(Ordering::Acquire) {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep((deadline - now).min(SLEEP_SLICE));
        }
    }
}
