//! Configuration models for pollers and leader leases.

pub mod poller;

pub use poller::{LeaderPollerConfig, PollerConfig, PollingConfig};
