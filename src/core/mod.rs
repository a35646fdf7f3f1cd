//! Core polling primitives, the traits they drive and the shared store seam.

pub mod error;
pub mod executor;
pub mod leader;
pub mod lease;
pub mod poller;

pub use error::{AppResult, PollerError, SharedError, StoreError};
pub use executor::{Condition, LeaderTask, PollQuery};
pub use leader::{
    CycleOutcome, ErrorSink, LeaderPoller, LeaderPollerSettings, DEFAULT_LEADER_INTERVAL,
    DEFAULT_REFRESH_INTERVAL, DEFAULT_SUBJECT,
};
pub use lease::{holds_lease, new_lease_token, KvStore};
pub use poller::{Poller, PollerSettings, PollerStats, DEFAULT_POLL_INTERVAL};
