//! Broker collaborator contract.
//!
//! The relay never speaks the broker's wire protocol itself. A client
//! library is plugged in through two traits:
//!
//! ```text
//! ┌──────────────────────────────┐
//! │ Broker                       │  connect(urls, options)
//! └──────────────┬───────────────┘
//!                │ Connection
//!                ▼
//! ┌──────────────────────────────┐
//! │ BrokerConnection             │  publish / stream_publish
//! │                              │  stream_info / add_stream / update_stream
//! └──────────────────────────────┘
//! ```
//!
//! `InMemoryBroker` implements both for tests and single-process setups.

mod in_memory;

use std::time::Duration;

use thiserror::Error;

pub use in_memory::{InMemoryBroker, InMemoryConnection, Published};

/// URL used for a connection that does not configure one.
pub const DEFAULT_URL: &str = "nats://localhost:4222";

/// Maximum number of addresses a single connection candidate may carry.
pub const MAX_SERVERS: usize = 10;

/// Client options used for every connect attempt.
///
/// Failover is driven by the relay itself, so the client's own reconnect
/// logic is always disabled. A backend maps the remaining fields onto its
/// client settings; `InMemoryBroker` only records them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConnectOptions {
    /// Connection name reported to the broker (the profile name)
    pub name: String,
    /// Client-level auto reconnect
    pub allow_reconnect: bool,
    /// Connect timeout
    pub connect_timeout: Duration,
    /// Interval between keep-alive pings
    pub ping_interval: Duration,
    /// Unanswered pings before the client declares the link dead
    pub max_pings_out: u32,
    /// Socket I/O buffer size in bytes
    pub io_buffer_size: usize,
    /// Maximum messages the client buffers before failing publishes
    pub max_pending_messages: usize,
}

impl ConnectOptions {
    /// Fixed options for the given profile.
    pub fn for_profile(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            allow_reconnect: false,
            connect_timeout: Duration::from_secs(2),
            ping_interval: Duration::from_secs(120),
            max_pings_out: 2,
            io_buffer_size: 32 * 1024,
            max_pending_messages: 65_536,
        }
    }
}

/// Where a durable stream keeps its messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageType {
    File,
    Memory,
}

/// When a durable stream discards messages.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RetentionPolicy {
    Limits,
    Interest,
    /// Messages are removed once consumed
    WorkQueue,
}

/// Configuration of a durable, subject-addressed stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamConfig {
    pub name: String,
    pub subjects: Vec<String>,
    pub storage: StorageType,
    pub retention: RetentionPolicy,
}

impl StreamConfig {
    /// In-memory work-queue stream covering a single subject.
    pub fn work_queue(name: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            subjects: vec![subject.into()],
            storage: StorageType::Memory,
            retention: RetentionPolicy::WorkQueue,
        }
    }

    /// Whether `subject` is registered on this stream.
    pub fn has_subject(&self, subject: &str) -> bool {
        self.subjects.iter().any(|s| s == subject)
    }
}

/// Errors reported by a broker client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrokerError {
    /// The requested resource (stream) does not exist
    #[error("not found")]
    NotFound,
    /// The connection is closed
    #[error("connection closed")]
    ConnectionClosed,
    /// Socket or protocol failure on an established connection
    #[error("transport error: {0}")]
    Transport(String),
    /// The broker refused the request
    #[error("request rejected: {0}")]
    Rejected(String),
    /// Anything else
    #[error("{0}")]
    Other(String),
}

impl BrokerError {
    /// Whether the error means the connection itself is unusable.
    pub fn is_transport(&self) -> bool {
        matches!(self, BrokerError::Transport(_) | BrokerError::ConnectionClosed)
    }
}

/// A broker client able to open connections.
pub trait Broker: Send + Sync + 'static {
    type Connection: BrokerConnection;

    /// Connect to the first reachable address in `urls`.
    fn connect(
        &self,
        urls: &[String],
        options: &ConnectOptions,
    ) -> Result<Self::Connection, BrokerError>;
}

/// An established broker connection. Dropping it closes it.
pub trait BrokerConnection: Send + 'static {
    /// Plain fire-and-forget publish.
    fn publish(&self, subject: &str, payload: &[u8]) -> Result<(), BrokerError>;

    /// Publish into a durable stream.
    fn stream_publish(&self, subject: &str, payload: &[u8]) -> Result<(), BrokerError>;

    /// Look a stream up by name; `BrokerError::NotFound` when it does not exist.
    fn stream_info(&self, name: &str) -> Result<StreamConfig, BrokerError>;

    /// Create a stream.
    fn add_stream(&self, config: &StreamConfig) -> Result<(), BrokerError>;

    /// Replace an existing stream's configuration.
    fn update_stream(&self, config: &StreamConfig) -> Result<(), BrokerError>;
}
