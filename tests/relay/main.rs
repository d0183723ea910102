//! Relay integration tests.
//!
//! Exercise profiles end to end against the in-memory broker:
//! - ingress gating and circuit breaking
//! - connection failover
//! - durable stream provisioning
//! - transport failures and requeue
//! - registry load / reload / shutdown

mod config;
mod failover;
mod ingress;
mod registry;
mod requeue;
mod stream;
mod support;
