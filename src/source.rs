//! Event-bus collaborator: delivers events to subscribed handlers.
//!
//! Delivery is synchronous, one event at a time, on the publishing thread.
//! Handlers therefore must not block.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use thiserror::Error;

use crate::filter::EventSelector;
use crate::message::IncomingEvent;

/// Callback invoked for every matching event.
pub type EventHandler = Arc<dyn Fn(&IncomingEvent) + Send + Sync>;

/// Identifies a subscription for later removal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubscribeError {
    #[error("cannot bind handler for {selector}: {reason}")]
    Rejected { selector: String, reason: String },
}

/// Anything that can deliver events to handlers.
pub trait EventSource: Send + Sync {
    fn subscribe(
        &self,
        selector: EventSelector,
        handler: EventHandler,
    ) -> Result<SubscriptionId, SubscribeError>;

    /// Remove a subscription. Returns whether it existed.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}

struct Subscription {
    id: SubscriptionId,
    selector: EventSelector,
    handler: EventHandler,
}

/// Synchronous in-process event bus. Clones share subscribers.
///
/// ```
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use broker_relay::{EventSelector, EventSource, IncomingEvent, LocalEventBus};
///
/// let bus = LocalEventBus::new();
/// let seen = Arc::new(AtomicUsize::new(0));
/// let counter = Arc::clone(&seen);
/// bus.subscribe(
///     EventSelector::Named("HEARTBEAT".into()),
///     Arc::new(move |_: &IncomingEvent| { counter.fetch_add(1, Ordering::SeqCst); }),
/// ).unwrap();
///
/// bus.dispatch(&IncomingEvent::new("HEARTBEAT", serde_json::json!({})));
/// bus.dispatch(&IncomingEvent::new("OTHER", serde_json::json!({})));
/// assert_eq!(seen.load(Ordering::SeqCst), 1);
/// ```
#[derive(Clone, Default)]
pub struct LocalEventBus {
    subscriptions: Arc<RwLock<Vec<Subscription>>>,
    next_id: Arc<AtomicU64>,
}

impl LocalEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver an event to every matching handler. Returns how many ran.
    pub fn dispatch(&self, event: &IncomingEvent) -> usize {
        // Handlers run outside the lock so they may (un)subscribe.
        let handlers: Vec<EventHandler> = self
            .subscriptions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|s| s.selector.matches(event))
            .map(|s| Arc::clone(&s.handler))
            .collect();

        for handler in &handlers {
            handler(event);
        }
        handlers.len()
    }

    /// Number of live subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl EventSource for LocalEventBus {
    fn subscribe(
        &self,
        selector: EventSelector,
        handler: EventHandler,
    ) -> Result<SubscriptionId, SubscribeError> {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscriptions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Subscription {
                id,
                selector,
                handler,
            });
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscriptions = self
            .subscriptions
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = subscriptions.len();
        subscriptions.retain(|s| s.id != id);
        subscriptions.len() != before
    }
}
