//! Idempotent provisioning of a profile's durable stream.
//!
//! `ensure` runs once per successful (re)connect when the feature is enabled:
//!
//! 1. look the stream up by name
//! 2. found and the subject is registered: nothing to do
//! 3. found without the subject: append it and update
//! 4. not found: create it (memory storage, work-queue retention)
//!
//! Any failure leaves the stream not ready; delivery then falls back to
//! plain publish until the next successful provisioning.

use thiserror::Error;
use tracing::{debug, info};

use crate::broker::{BrokerConnection, BrokerError, StreamConfig};

/// Wildcard suffix the stream subject always carries.
const WILDCARD_SUFFIX: &str = ".*";

/// Derive the stream subject from a profile subject: strip one trailing
/// `.*` if present, then append `.*`.
///
/// ```
/// use broker_relay::stream::stream_subject;
///
/// assert_eq!(stream_subject("orders"), "orders.*");
/// assert_eq!(stream_subject("orders.*"), "orders.*");
/// ```
pub fn stream_subject(subject: &str) -> String {
    let base = subject.strip_suffix(WILDCARD_SUFFIX).unwrap_or(subject);
    format!("{base}{WILDCARD_SUFFIX}")
}

/// Durable stream settings of a profile.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamSettings {
    name: String,
    subject: String,
    enabled: bool,
}

impl StreamSettings {
    /// Settings for stream `name` covering `profile_subject`.
    pub fn new(name: impl Into<String>, profile_subject: &str, enabled: bool) -> Self {
        Self {
            name: name.into(),
            subject: stream_subject(profile_subject),
            enabled,
        }
    }

    /// Stream provisioning switched off.
    pub fn disabled(name: impl Into<String>, profile_subject: &str) -> Self {
        Self::new(name, profile_subject, false)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Derived stream subject (always ends in `.*`).
    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Subject used for an event once the stream is ready.
    pub fn publish_subject(&self, event_name: &str) -> String {
        format!("{}.{}", self.subject, event_name)
    }

    /// Configuration used when the stream has to be created.
    pub fn create_config(&self) -> StreamConfig {
        StreamConfig::work_queue(self.name.clone(), self.subject.clone())
    }
}

/// What `ensure` had to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamOutcome {
    /// Stream existed with the subject registered; nothing was changed
    AlreadyPresent,
    /// Stream existed; the subject was appended
    SubjectAdded,
    /// Stream was created
    Created,
}

/// Stream provisioning failure. The stream stays not ready.
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("could not get stream [{stream}] info: {source}")]
    Query {
        stream: String,
        #[source]
        source: BrokerError,
    },

    #[error("could not add stream [{stream}] with subject [{subject}]: {source}")]
    Create {
        stream: String,
        subject: String,
        #[source]
        source: BrokerError,
    },

    #[error("could not update stream [{stream}]: {source}")]
    Update {
        stream: String,
        #[source]
        source: BrokerError,
    },
}

/// Make sure the stream exists and covers the profile's subject.
pub fn ensure<C: BrokerConnection>(
    conn: &C,
    settings: &StreamSettings,
) -> Result<StreamOutcome, StreamError> {
    let stream = settings.name();
    let subject = settings.subject();

    match conn.stream_info(stream) {
        Ok(config) if config.has_subject(subject) => {
            debug!(stream, subject, "subject found");
            Ok(StreamOutcome::AlreadyPresent)
        }
        Ok(mut config) => {
            config.subjects.push(subject.to_string());
            conn.update_stream(&config)
                .map_err(|source| StreamError::Update {
                    stream: stream.to_string(),
                    source,
                })?;
            info!(stream, subject, "added subject to stream");
            Ok(StreamOutcome::SubjectAdded)
        }
        Err(BrokerError::NotFound) => {
            info!(stream, "stream not found, creating it");
            conn.add_stream(&settings.create_config())
                .map_err(|source| StreamError::Create {
                    stream: stream.to_string(),
                    subject: subject.to_string(),
                    source,
                })?;
            Ok(StreamOutcome::Created)
        }
        Err(source) => Err(StreamError::Query {
            stream: stream.to_string(),
            source,
        }),
    }
}
