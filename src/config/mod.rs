//! Profile configuration.
//!
//! The raw model mirrors the configuration document and is deliberately
//! lenient (everything optional). `ProfileConfig::resolve` turns one entry
//! into validated `ProfileSettings`, applying defaults:
//!
//! | field                   | default                 |
//! |-------------------------|-------------------------|
//! | `subject`               | profile name            |
//! | `stream_enabled`        | `false`                 |
//! | `stream_name`           | profile name            |
//! | `send_queue_size`       | 5000                    |
//! | `circuit_breaker_ms`    | 10000                   |
//! | `reconnect_interval_ms` | 1000                    |
//! | connection `url`        | `nats://localhost:4222` |
//!
//! Numeric values only override a default when strictly positive. Numbers
//! and flags may also be written as strings (`"100"`, `"yes"`).
//!
//! Each profile entry is decoded on its own: a malformed entry is kept as
//! [`ProfileEntry::Malformed`] and skipped at load, the others still load.

mod error;
mod scalar;

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::breaker;
use crate::broker::{DEFAULT_URL, MAX_SERVERS};
use crate::publisher::{DEFAULT_POLL_TIMEOUT, DEFAULT_RECONNECT_INTERVAL};
use crate::queue::DEFAULT_CAPACITY;
use crate::stream::StreamSettings;

pub use error::ConfigError;

/// Top-level configuration document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BridgeConfig {
    pub publishers: Vec<ProfileEntry>,
}

#[derive(Deserialize)]
struct RawDocument {
    #[serde(default)]
    publishers: Vec<serde_json::Value>,
}

impl BridgeConfig {
    /// Build a document from already decoded profiles.
    pub fn new(publishers: impl IntoIterator<Item = ProfileConfig>) -> Self {
        Self {
            publishers: publishers.into_iter().map(ProfileEntry::Valid).collect(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Self::from_value(serde_json::from_str(json)?)
    }

    /// Decode a parsed document. Only a document whose `publishers` is not a
    /// list fails as a whole.
    pub fn from_value(value: serde_json::Value) -> Result<Self, ConfigError> {
        let raw: RawDocument = serde_json::from_value(value)?;
        Ok(Self {
            publishers: raw.publishers.into_iter().map(ProfileEntry::decode).collect(),
        })
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&text)
    }
}

/// One entry of the `publishers` list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileEntry {
    Valid(ProfileConfig),
    /// The entry did not match the profile schema
    Malformed { name: Option<String>, reason: String },
}

impl ProfileEntry {
    fn decode(value: serde_json::Value) -> Self {
        let name = value
            .get("name")
            .and_then(serde_json::Value::as_str)
            .map(String::from);

        match serde_json::from_value(value) {
            Ok(config) => ProfileEntry::Valid(config),
            Err(err) => {
                warn!(
                    profile = name.as_deref().unwrap_or("<unnamed>"),
                    error = %err,
                    "malformed profile entry"
                );
                ProfileEntry::Malformed {
                    name,
                    reason: err.to_string(),
                }
            }
        }
    }

    /// Profile name, when the entry has one.
    pub fn name(&self) -> Option<&str> {
        match self {
            ProfileEntry::Valid(config) => non_empty(&config.name),
            ProfileEntry::Malformed { name, .. } => name.as_deref(),
        }
    }

    /// Validate and apply defaults.
    pub fn resolve(&self) -> Result<ProfileSettings, ConfigError> {
        match self {
            ProfileEntry::Valid(config) => config.resolve(),
            ProfileEntry::Malformed { name, reason } => Err(ConfigError::Malformed {
                profile: name.clone().unwrap_or_else(|| "<unnamed>".to_string()),
                reason: reason.clone(),
            }),
        }
    }
}

/// One publisher profile as written in the configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileConfig {
    pub name: Option<String>,
    pub subject: Option<String>,
    #[serde(default, alias = "jetstream_enabled", deserialize_with = "scalar::flag")]
    pub stream_enabled: bool,
    #[serde(alias = "jetstream_name")]
    pub stream_name: Option<String>,
    #[serde(default, deserialize_with = "scalar::integer")]
    pub send_queue_size: Option<i64>,
    #[serde(default, deserialize_with = "scalar::integer")]
    pub circuit_breaker_ms: Option<i64>,
    #[serde(default, deserialize_with = "scalar::integer")]
    pub reconnect_interval_ms: Option<i64>,
    pub event_filter: Option<String>,
    #[serde(default)]
    pub connections: Vec<ConnectionConfig>,
}

/// One named connection of a profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub name: Option<String>,
    /// One address, or several separated by commas
    pub url: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn positive(value: Option<i64>) -> Option<u64> {
    value.filter(|v| *v > 0).map(|v| v as u64)
}

impl ConnectionConfig {
    /// Resolve into a named address list.
    pub fn resolve(&self, profile: &str) -> Result<ConnectionSettings, ConfigError> {
        let name = non_empty(&self.name).ok_or_else(|| ConfigError::MissingAttribute {
            item: format!("profile [{profile}] connection"),
            attribute: "name",
        })?;

        let mut urls: Vec<String> = non_empty(&self.url)
            .map(|url| {
                url.split(',')
                    .map(str::trim)
                    .filter(|u| !u.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        if urls.is_empty() {
            urls.push(DEFAULT_URL.to_string());
        }
        if urls.len() > MAX_SERVERS {
            warn!(
                profile,
                connection = name,
                max = MAX_SERVERS,
                "too many servers, ignoring the rest"
            );
            urls.truncate(MAX_SERVERS);
        }

        Ok(ConnectionSettings {
            name: name.to_string(),
            urls,
        })
    }
}

impl ProfileConfig {
    /// Validate and apply defaults.
    pub fn resolve(&self) -> Result<ProfileSettings, ConfigError> {
        let name = non_empty(&self.name).ok_or(ConfigError::MissingName)?;
        let subject = non_empty(&self.subject).unwrap_or(name);
        let stream_name = non_empty(&self.stream_name).unwrap_or(name);

        let mut connections = Vec::with_capacity(self.connections.len());
        for connection in &self.connections {
            match connection.resolve(name) {
                Ok(settings) => connections.push(settings),
                Err(err) => warn!(profile = name, error = %err, "failed to create connection"),
            }
        }

        Ok(ProfileSettings {
            name: name.to_string(),
            subject: subject.to_string(),
            stream: StreamSettings::new(stream_name, subject, self.stream_enabled),
            queue_capacity: positive(self.send_queue_size)
                .map(|v| v as usize)
                .unwrap_or(DEFAULT_CAPACITY),
            breaker_duration: positive(self.circuit_breaker_ms)
                .map(Duration::from_millis)
                .unwrap_or(breaker::DEFAULT_DURATION),
            reconnect_interval: positive(self.reconnect_interval_ms)
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_RECONNECT_INTERVAL),
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            event_filter: non_empty(&self.event_filter).map(String::from),
            connections,
        })
    }
}

/// A resolved connection candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionSettings {
    pub name: String,
    pub urls: Vec<String>,
}

/// A validated profile with every default applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileSettings {
    pub name: String,
    pub subject: String,
    pub stream: StreamSettings,
    pub queue_capacity: usize,
    pub breaker_duration: Duration,
    pub reconnect_interval: Duration,
    /// Upper bound on how long the worker waits for a message before
    /// re-checking for shutdown
    pub poll_timeout: Duration,
    pub event_filter: Option<String>,
    pub connections: Vec<ConnectionSettings>,
}

impl ProfileSettings {
    /// Settings for `name` with every default and no connections.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            subject: name.clone(),
            stream: StreamSettings::disabled(name.clone(), &name),
            queue_capacity: DEFAULT_CAPACITY,
            breaker_duration: breaker::DEFAULT_DURATION,
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            event_filter: None,
            connections: Vec::new(),
            name,
        }
    }

    /// Publish on `subject`. The stream subject follows.
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self.stream = StreamSettings::new(
            self.stream.name().to_string(),
            &self.subject,
            self.stream.enabled(),
        );
        self
    }

    /// Enable the durable stream `name`.
    pub fn with_stream(mut self, name: impl Into<String>) -> Self {
        self.stream = StreamSettings::new(name, &self.subject, true);
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_breaker_duration(mut self, duration: Duration) -> Self {
        self.breaker_duration = duration;
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

    pub fn with_event_filter(mut self, filter: impl Into<String>) -> Self {
        self.event_filter = Some(filter.into());
        self
    }

    /// Append a connection candidate.
    pub fn with_connection<I, S>(mut self, name: impl Into<String>, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.connections.push(ConnectionSettings {
            name: name.into(),
            urls: urls.into_iter().map(Into::into).collect(),
        });
        self
    }
}
