//! Event filters: which bus events a profile subscribes to.
//!
//! A filter is a comma-separated list of tokens:
//! - an event type name known to the event bus (`CHANNEL_CREATE`)
//! - `ALL` for every event
//! - `CUSTOM::<subclass>` for custom events of one subclass
//!
//! Unrecognized tokens are logged and skipped; they never fail the profile.

use std::collections::BTreeSet;
use std::fmt;

use tracing::{error, info};

use crate::message::IncomingEvent;

/// Prefix selecting custom events by subclass.
pub const CUSTOM_PREFIX: &str = "CUSTOM::";

/// Token selecting every event.
pub const ALL_EVENTS: &str = "ALL";

/// One subscription of a profile.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventSelector {
    All,
    Named(String),
    Custom(String),
}

impl EventSelector {
    /// Whether `event` falls under this selector.
    pub fn matches(&self, event: &IncomingEvent) -> bool {
        match self {
            EventSelector::All => true,
            EventSelector::Named(name) => event.name == *name,
            EventSelector::Custom(subclass) => {
                event.is_custom() && event.subclass.as_deref() == Some(subclass.as_str())
            }
        }
    }
}

impl fmt::Display for EventSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventSelector::All => f.write_str(ALL_EVENTS),
            EventSelector::Named(name) => f.write_str(name),
            EventSelector::Custom(subclass) => write!(f, "{CUSTOM_PREFIX}{subclass}"),
        }
    }
}

/// The set of event type names the event bus knows about.
pub trait EventCatalog: Send + Sync {
    fn recognizes(&self, name: &str) -> bool;
}

/// Catalog accepting any non-empty name.
#[derive(Clone, Copy, Debug, Default)]
pub struct AnyEvent;

impl EventCatalog for AnyEvent {
    fn recognizes(&self, name: &str) -> bool {
        !name.is_empty()
    }
}

/// Catalog backed by a fixed list of names.
#[derive(Clone, Debug, Default)]
pub struct StaticCatalog {
    names: BTreeSet<String>,
}

impl StaticCatalog {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }
}

impl EventCatalog for StaticCatalog {
    fn recognizes(&self, name: &str) -> bool {
        self.names.contains(name)
    }
}

/// Parse a single filter token.
pub fn parse_token(token: &str, catalog: &dyn EventCatalog) -> Option<EventSelector> {
    let token = token.trim();
    if token == ALL_EVENTS {
        return Some(EventSelector::All);
    }
    if let Some(subclass) = token.strip_prefix(CUSTOM_PREFIX) {
        return (!subclass.is_empty()).then(|| EventSelector::Custom(subclass.to_string()));
    }
    catalog
        .recognizes(token)
        .then(|| EventSelector::Named(token.to_string()))
}

/// Parse a comma-separated filter, skipping (and logging) unrecognized tokens.
/// Duplicates are kept once, in first-seen order.
pub fn parse_filter(filter: &str, catalog: &dyn EventCatalog, profile: &str) -> Vec<EventSelector> {
    let mut selectors = Vec::new();

    for token in filter.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        match parse_token(token, catalog) {
            Some(selector) if !selectors.contains(&selector) => selectors.push(selector),
            Some(_) => {}
            None => error!(profile, event = token, "event was not recognised, skipping"),
        }
    }

    info!(profile, subscriptions = selectors.len(), "parsed event filter");
    selectors
}
