//! Builders to construct pollers from configuration.

pub mod poller_builder;

pub use poller_builder::{build_leader_poller, build_poller};
