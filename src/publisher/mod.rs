//! Publisher Worker - drains a profile's queue into the broker.
//!
//! One worker per profile, on its own thread. It owns the connection
//! candidates and the stream readiness flag; nothing else writes them.
//!
//! ```text
//!              open ok, stream off ---------> Connected(Plain)
//!            + open ok, ensure ok ----------> Connected(Stream)
//! Disconnected - open ok, ensure failed ----> Connected(Fallback)
//!      ^     + open failed: sleep reconnect_interval, retry
//!      |
//!      +---- transport error on send: close, requeue message once
//!
//! Connected(Stream) - stream publish rejected: drop, ensure again
//!
//! running flag cleared ---------------------> Stopped
//! ```
//!
//! The worker only suspends in two places: the queue pop (bounded by the
//! poll timeout) and the reconnect sleep.

mod state;
mod thread;
mod worker;

pub use state::{DeliveryMode, StateCell, WorkerState};
pub use thread::WorkerHandle;
pub use worker::{
    PublisherWorker, SendError, WorkerStats, DEFAULT_POLL_TIMEOUT, DEFAULT_RECONNECT_INTERVAL,
};
