pub mod breaker;
pub mod broker;
pub mod config;
pub mod connection;
pub mod filter;
pub mod message;
pub mod profile;
pub mod publisher;
pub mod queue;
pub mod registry;
pub mod source;
pub mod stream;
pub mod telemetry;

pub use breaker::CircuitBreaker;
pub use broker::{
    Broker, BrokerConnection, BrokerError, ConnectOptions, InMemoryBroker, InMemoryConnection,
    Published, StreamConfig,
};
pub use config::{
    BridgeConfig, ConfigError, ConnectionSettings, ProfileConfig, ProfileEntry, ProfileSettings,
};
pub use connection::{Candidate, CandidateList, ConnectError};
pub use filter::{AnyEvent, EventCatalog, EventSelector, StaticCatalog};
pub use message::{IncomingEvent, Message};
pub use profile::{IngestOutcome, Ingress, Profile, ProfileError};
pub use publisher::{
    DeliveryMode, PublisherWorker, SendError, WorkerHandle, WorkerState, WorkerStats,
};
pub use queue::{BoundedQueue, QueueFull};
pub use registry::{LoadReport, Registry, SkippedProfile};
pub use source::{EventHandler, EventSource, LocalEventBus, SubscribeError, SubscriptionId};
pub use stream::{StreamError, StreamOutcome, StreamSettings};
