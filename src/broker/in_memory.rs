//! In-memory broker for testing and single-process scenarios.
//!
//! Addresses are "reachable" only when brought up explicitly, publishes are
//! recorded in order, and failures can be queued up to exercise the relay's
//! reconnect and requeue paths.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::{Broker, BrokerConnection, BrokerError, ConnectOptions, StreamConfig};

/// A message accepted by the in-memory broker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Published {
    /// Address of the connection that sent it
    pub url: String,
    pub subject: String,
    pub payload: String,
    /// Sent through `stream_publish`
    pub stream: bool,
}

/// Number of stream management calls seen by the broker.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreamCalls {
    pub info: usize,
    pub add: usize,
    pub update: usize,
}

#[derive(Default)]
struct BrokerState {
    reachable: HashSet<String>,
    attempts: Vec<String>,
    options: Vec<ConnectOptions>,
    published: Vec<Published>,
    streams: BTreeMap<String, StreamConfig>,
    publish_failures: VecDeque<BrokerError>,
    stream_failure: Option<BrokerError>,
    stream_calls: StreamCalls,
    open: HashSet<u64>,
    next_id: u64,
}

fn lock(state: &Mutex<BrokerState>) -> MutexGuard<'_, BrokerState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory broker. Clones share the same state.
///
/// ## Example
///
/// ```
/// use broker_relay::broker::{Broker, BrokerConnection, ConnectOptions, InMemoryBroker};
///
/// let broker = InMemoryBroker::with_reachable(["nats://b:4222"]);
/// let options = ConnectOptions::for_profile("demo");
///
/// assert!(broker.connect(&["nats://a:4222".to_string()], &options).is_err());
///
/// let conn = broker.connect(&["nats://b:4222".to_string()], &options).unwrap();
/// conn.publish("demo", b"{}").unwrap();
/// assert_eq!(broker.published_subjects(), vec!["demo"]);
/// ```
#[derive(Clone, Default)]
pub struct InMemoryBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl InMemoryBroker {
    /// Create a broker with no reachable addresses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a broker where the given addresses accept connections.
    pub fn with_reachable<I, S>(urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let broker = Self::new();
        for url in urls {
            broker.bring_up(url);
        }
        broker
    }

    fn state(&self) -> MutexGuard<'_, BrokerState> {
        lock(&self.state)
    }

    /// Make an address accept connections.
    pub fn bring_up(&self, url: impl Into<String>) {
        self.state().reachable.insert(url.into());
    }

    /// Make an address refuse connections. Connections already open to it
    /// fail their next publish with a transport error.
    pub fn take_down(&self, url: &str) {
        self.state().reachable.remove(url);
    }

    /// Whether an address accepts connections.
    pub fn is_reachable(&self, url: &str) -> bool {
        self.state().reachable.contains(url)
    }

    /// Every address a connect was attempted against, in order.
    pub fn connect_attempts(&self) -> Vec<String> {
        self.state().attempts.clone()
    }

    /// Options passed to every `connect` call, in order.
    pub fn connect_options(&self) -> Vec<ConnectOptions> {
        self.state().options.clone()
    }

    /// Number of connections not yet dropped.
    pub fn open_connections(&self) -> usize {
        self.state().open.len()
    }

    /// All accepted messages in order.
    pub fn published(&self) -> Vec<Published> {
        self.state().published.clone()
    }

    /// Subjects of all accepted messages in order.
    pub fn published_subjects(&self) -> Vec<String> {
        self.state()
            .published
            .iter()
            .map(|p| p.subject.clone())
            .collect()
    }

    /// Fail the next publish (plain or stream) with `error`. Calls stack up.
    pub fn fail_next_publish(&self, error: BrokerError) {
        self.state().publish_failures.push_back(error);
    }

    /// Fail every stream management call with `error` until cleared with `None`.
    pub fn fail_stream_requests(&self, error: Option<BrokerError>) {
        self.state().stream_failure = error;
    }

    /// Create or replace a stream directly.
    pub fn insert_stream(&self, config: StreamConfig) {
        self.state().streams.insert(config.name.clone(), config);
    }

    /// Look a stream up directly.
    pub fn stream(&self, name: &str) -> Option<StreamConfig> {
        self.state().streams.get(name).cloned()
    }

    /// Stream management calls seen so far.
    pub fn stream_calls(&self) -> StreamCalls {
        self.state().stream_calls
    }
}

impl Broker for InMemoryBroker {
    type Connection = InMemoryConnection;

    fn connect(
        &self,
        urls: &[String],
        options: &ConnectOptions,
    ) -> Result<InMemoryConnection, BrokerError> {
        let mut state = self.state();
        state.options.push(options.clone());

        for url in urls {
            state.attempts.push(url.clone());
            if state.reachable.contains(url) {
                state.next_id += 1;
                let id = state.next_id;
                state.open.insert(id);
                return Ok(InMemoryConnection {
                    id,
                    url: url.clone(),
                    state: Arc::clone(&self.state),
                });
            }
        }

        Err(BrokerError::Transport(format!(
            "no server available among {}",
            urls.join(",")
        )))
    }
}

/// Connection handed out by `InMemoryBroker`.
pub struct InMemoryConnection {
    id: u64,
    url: String,
    state: Arc<Mutex<BrokerState>>,
}

impl InMemoryConnection {
    /// Address this connection is bound to.
    pub fn url(&self) -> &str {
        &self.url
    }

    fn record(&self, subject: &str, payload: &[u8], stream: bool) -> Result<(), BrokerError> {
        let mut state = lock(&self.state);

        if let Some(error) = state.publish_failures.pop_front() {
            return Err(error);
        }
        if !state.reachable.contains(&self.url) {
            return Err(BrokerError::Transport(format!(
                "connection to {} lost",
                self.url
            )));
        }

        state.published.push(Published {
            url: self.url.clone(),
            subject: subject.to_string(),
            payload: String::from_utf8_lossy(payload).into_owned(),
            stream,
        });
        Ok(())
    }

    fn stream_request(&self) -> Result<MutexGuard<'_, BrokerState>, BrokerError> {
        let state = lock(&self.state);
        match &state.stream_failure {
            Some(error) => Err(error.clone()),
            None => Ok(state),
        }
    }
}

impl BrokerConnection for InMemoryConnection {
    fn publish(&self, subject: &str, payload: &[u8]) -> Result<(), BrokerError> {
        self.record(subject, payload, false)
    }

    fn stream_publish(&self, subject: &str, payload: &[u8]) -> Result<(), BrokerError> {
        self.record(subject, payload, true)
    }

    fn stream_info(&self, name: &str) -> Result<StreamConfig, BrokerError> {
        lock(&self.state).stream_calls.info += 1;
        let state = self.stream_request()?;
        state.streams.get(name).cloned().ok_or(BrokerError::NotFound)
    }

    fn add_stream(&self, config: &StreamConfig) -> Result<(), BrokerError> {
        lock(&self.state).stream_calls.add += 1;
        let mut state = self.stream_request()?;
        if state.streams.contains_key(&config.name) {
            return Err(BrokerError::Rejected(format!(
                "stream name {} already in use",
                config.name
            )));
        }
        state.streams.insert(config.name.clone(), config.clone());
        Ok(())
    }

    fn update_stream(&self, config: &StreamConfig) -> Result<(), BrokerError> {
        lock(&self.state).stream_calls.update += 1;
        let mut state = self.stream_request()?;
        match state.streams.get_mut(&config.name) {
            Some(existing) => {
                *existing = config.clone();
                Ok(())
            }
            None => Err(BrokerError::NotFound),
        }
    }
}

impl Drop for InMemoryConnection {
    fn drop(&mut self) {
        lock(&self.state).open.remove(&self.id);
    }
}
