//! Profile - one named unit routing a filtered subset of bus events to one
//! broker destination.
//!
//! A profile composes the ingress gate, the bounded queue and a publisher
//! worker thread. Dropping a profile (or calling [`Profile::stop`]) first
//! unsubscribes from the event source, then joins the worker, and only then
//! releases the queue.

mod error;
mod ingress;

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::breaker::CircuitBreaker;
use crate::broker::Broker;
use crate::config::ProfileSettings;
use crate::connection::{Candidate, CandidateList};
use crate::filter::{parse_filter, EventCatalog};
use crate::message::IncomingEvent;
use crate::publisher::{
    DeliveryMode, PublisherWorker, StateCell, WorkerHandle, WorkerState, WorkerStats,
};
use crate::queue::BoundedQueue;
use crate::source::{EventSource, SubscriptionId};

pub use error::ProfileError;
pub use ingress::{IngestOutcome, Ingress};

/// A running profile.
pub struct Profile {
    name: String,
    subject: String,
    ingress: Arc<Ingress>,
    state: Arc<StateCell>,
    worker: Option<WorkerHandle>,
    source: Option<Arc<dyn EventSource>>,
    subscriptions: Vec<SubscriptionId>,
}

impl Profile {
    /// Start the publisher worker and subscribe to the configured events.
    ///
    /// Without a `source` the profile is only fed through [`Profile::ingest`].
    pub fn start<B: Broker>(
        settings: &ProfileSettings,
        broker: B,
        source: Option<Arc<dyn EventSource>>,
        catalog: &dyn EventCatalog,
    ) -> Result<Self, ProfileError> {
        let name = settings.name.clone();
        if settings.connections.is_empty() {
            return Err(ProfileError::NoConnections { profile: name });
        }

        let mut candidates = CandidateList::new();
        for connection in &settings.connections {
            candidates.push(Candidate::new(
                connection.name.clone(),
                connection.urls.iter().cloned(),
            ));
        }

        let queue = Arc::new(BoundedQueue::new(settings.queue_capacity));
        let running = Arc::new(AtomicBool::new(true));
        let state = Arc::new(StateCell::new());
        let ingress = Arc::new(Ingress::new(
            name.clone(),
            Arc::clone(&running),
            CircuitBreaker::new(settings.breaker_duration),
            Arc::clone(&queue),
        ));

        let worker = PublisherWorker::new(
            name.clone(),
            settings.subject.clone(),
            broker,
            candidates,
            queue,
        )
        .with_stream(settings.stream.clone())
        .with_running(running)
        .with_state(Arc::clone(&state))
        .with_reconnect_interval(settings.reconnect_interval)
        .with_poll_timeout(settings.poll_timeout)
        .spawn()
        .map_err(|source| ProfileError::Spawn {
            profile: name.clone(),
            source,
        })?;

        let mut profile = Self {
            name,
            subject: settings.subject.clone(),
            ingress,
            state,
            worker: Some(worker),
            source,
            subscriptions: Vec::new(),
        };
        // On error `profile` is dropped here, which joins the worker.
        profile.subscribe(settings.event_filter.as_deref(), catalog)?;

        info!(
            profile = %profile.name,
            subject = %profile.subject,
            stream = settings.stream.enabled(),
            capacity = settings.queue_capacity,
            "profile started"
        );
        Ok(profile)
    }

    fn subscribe(
        &mut self,
        filter: Option<&str>,
        catalog: &dyn EventCatalog,
    ) -> Result<(), ProfileError> {
        let Some(source) = self.source.clone() else {
            return Ok(());
        };
        let Some(filter) = filter else {
            warn!(profile = %self.name, "no event filter configured, nothing will be published");
            return Ok(());
        };

        for selector in parse_filter(filter, catalog, &self.name) {
            let ingress = Arc::clone(&self.ingress);
            let id = source
                .subscribe(
                    selector,
                    Arc::new(move |event: &IncomingEvent| {
                        ingress.accept(event);
                    }),
                )
                .map_err(|source| ProfileError::Subscribe {
                    profile: self.name.clone(),
                    source,
                })?;
            self.subscriptions.push(id);
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configured (plain publish) subject.
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Queue an event for delivery. Never blocks.
    pub fn ingest<T: Serialize + ?Sized>(&self, event_name: &str, payload: &T) -> IngestOutcome {
        self.ingress.ingest(event_name, payload)
    }

    /// Queue an event delivered by the event bus. Never blocks.
    pub fn accept(&self, event: &IncomingEvent) -> IngestOutcome {
        self.ingress.accept(event)
    }

    /// Shared producer side, for wiring custom event sources.
    pub fn ingress(&self) -> Arc<Ingress> {
        Arc::clone(&self.ingress)
    }

    pub fn is_running(&self) -> bool {
        self.ingress.is_running()
    }

    /// Last state published by the worker.
    pub fn state(&self) -> WorkerState {
        self.state.load()
    }

    /// How messages are currently published, if connected.
    pub fn delivery_mode(&self) -> Option<DeliveryMode> {
        self.state().delivery_mode()
    }

    pub fn queue_len(&self) -> usize {
        self.ingress.queue().len()
    }

    pub fn queue_capacity(&self) -> usize {
        self.ingress.queue().capacity()
    }

    pub fn breaker_open(&self) -> bool {
        self.ingress.breaker().is_open()
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Stop the profile and return the worker statistics.
    pub fn stop(mut self) -> WorkerStats {
        self.shutdown()
    }

    fn shutdown(&mut self) -> WorkerStats {
        let Some(worker) = self.worker.take() else {
            return WorkerStats::default();
        };

        if let Some(source) = &self.source {
            for id in self.subscriptions.drain(..) {
                source.unsubscribe(id);
            }
        }

        let mut stats = worker.stop();
        stats.messages_discarded = self.ingress.queue().drain().len();

        info!(
            profile = %self.name,
            published = stats.messages_published,
            dropped = stats.messages_dropped,
            discarded = stats.messages_discarded,
            "profile stopped"
        );
        stats
    }
}

impl Drop for Profile {
    fn drop(&mut self) {
        self.shutdown();
    }
}
