//! Ordered connection candidates and manual failover.
//!
//! Every `open` rescans from the root (index 0). There is no round-robin
//! cursor: preference order is deterministic, and a dead first candidate is
//! retried on every reconnect.

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::broker::{Broker, BrokerConnection, BrokerError, ConnectOptions, MAX_SERVERS};

/// Failure to bring up any connection for a profile.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("profile [{profile}] has no connection candidates")]
    NoCandidates { profile: String },

    #[error("profile [{profile}] could not connect to any of {attempts} candidates: {last}")]
    Unreachable {
        profile: String,
        attempts: usize,
        #[source]
        last: BrokerError,
    },
}

/// One configured target a profile may connect to.
pub struct Candidate<C> {
    name: String,
    urls: Vec<String>,
    handle: Option<C>,
}

impl<C> Candidate<C> {
    /// Create a disconnected candidate. Addresses beyond `MAX_SERVERS` are ignored.
    pub fn new<I, S>(name: impl Into<String>, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            urls: urls.into_iter().take(MAX_SERVERS).map(Into::into).collect(),
            handle: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    /// Whether this candidate holds a live handle.
    pub fn is_connected(&self) -> bool {
        self.handle.is_some()
    }

    /// Destroy the handle if present. Idempotent.
    pub fn close(&mut self) -> bool {
        self.handle.take().is_some()
    }
}

/// Ordered candidate list with at most one active handle.
///
/// `active` is `Some` exactly when a connection is held.
pub struct CandidateList<C> {
    candidates: Vec<Candidate<C>>,
    active: Option<usize>,
}

impl<C> Default for CandidateList<C> {
    fn default() -> Self {
        Self {
            candidates: Vec::new(),
            active: None,
        }
    }
}

impl<C> CandidateList<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a candidate at the lowest preference.
    pub fn push(&mut self, candidate: Candidate<C>) {
        self.candidates.push(candidate);
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// First configured candidate.
    pub fn root(&self) -> Option<&Candidate<C>> {
        self.candidates.first()
    }

    /// Currently connected candidate.
    pub fn active(&self) -> Option<&Candidate<C>> {
        self.active.map(|index| &self.candidates[index])
    }

    pub fn active_index(&self) -> Option<usize> {
        self.active
    }

    /// Handle of the currently connected candidate.
    pub fn connection(&self) -> Option<&C> {
        self.active().and_then(|candidate| candidate.handle.as_ref())
    }

    pub fn is_connected(&self) -> bool {
        self.connection().is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Candidate<C>> {
        self.candidates.iter()
    }

    /// Destroy the active handle, if any. Idempotent.
    pub fn close(&mut self) -> bool {
        match self.active.take() {
            Some(index) => self.candidates[index].close(),
            None => false,
        }
    }

    /// Destroy every handle.
    pub fn close_all(&mut self) {
        self.active = None;
        for candidate in &mut self.candidates {
            candidate.close();
        }
    }
}

impl<C: BrokerConnection> CandidateList<C> {
    /// Connect to the first candidate, in configured order, that accepts.
    ///
    /// The previous handle is destroyed only once a new one is secured (or
    /// every candidate failed). On failure no candidate is active.
    pub fn open<B>(&mut self, broker: &B, options: &ConnectOptions) -> Result<usize, ConnectError>
    where
        B: Broker<Connection = C>,
    {
        let profile = options.name.as_str();
        if self.candidates.is_empty() {
            self.close();
            return Err(ConnectError::NoCandidates {
                profile: profile.to_string(),
            });
        }

        let previous = self
            .active
            .take()
            .and_then(|index| self.candidates[index].handle.take());

        let mut last = None;
        for (index, candidate) in self.candidates.iter_mut().enumerate() {
            debug!(profile, connection = %candidate.name, "trying to connect");

            match broker.connect(&candidate.urls, options) {
                Ok(handle) => {
                    candidate.handle = Some(handle);
                    self.active = Some(index);
                    drop(previous);
                    info!(profile, connection = %candidate.name, "connected");
                    return Ok(index);
                }
                Err(err) => {
                    warn!(
                        profile,
                        connection = %candidate.name,
                        error = %err,
                        "could not connect"
                    );
                    last = Some(err);
                }
            }
        }

        drop(previous);
        Err(ConnectError::Unreachable {
            profile: profile.to_string(),
            attempts: self.candidates.len(),
            last: last.unwrap_or(BrokerError::ConnectionClosed),
        })
    }
}
