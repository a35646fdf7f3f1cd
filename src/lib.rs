//! # Prometheus Poller
//!
//! Fixed-interval polling, soft-leader polling and retry-once initialization
//! for services of the Prometheus AI Platform.
//!
//! Many platform services need the same three things: build a client that may
//! not be reachable yet, then repeatedly read something from it, and, when the
//! service runs as several replicas, let only one replica act on what it read.
//!
//! ## Key Features
//!
//! - **RetryOnce**: retry an initializer until it succeeds (or a budget runs
//!   out), exactly once, no matter how many tasks ask for the value
//! - **Poller**: run a query on a fixed interval and fan each result or error
//!   out to subscriber callbacks, with an idempotent `stop`
//! - **LeaderPoller**: run a task on a fixed interval only while this instance
//!   holds the lease key of a subject in a shared key-value store, behind a
//!   chain of preconditions
//! - **Stores**: in-memory store for tests and single-process use, Redis store
//!   behind the `redis` feature
//!
//! ## Poller
//!
//! ```rust
//! use prometheus_poller::core::{AppResult, Poller};
//! use std::time::Duration;
//!
//! #[derive(Debug, Default, Clone)]
//! struct Row {
//!     user: String,
//!     id: i64,
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let poller = Poller::new(|row: &mut Row| -> AppResult<()> {
//!     row.user = "user 1".into();
//!     row.id = 1;
//!     Ok(())
//! });
//! poller.setting(|s| s.interval = Duration::from_millis(5));
//! poller
//!     .then(|row| println!("read {} {}", row.id, row.user))
//!     .catch(|err| eprintln!("read failed: {err}"));
//!
//! tokio::time::sleep(Duration::from_millis(20)).await;
//! poller.stop();
//! # }
//! ```
//!
//! ## LeaderPoller
//!
//! ```rust,ignore
//! use prometheus_poller::core::{AppResult, LeaderPoller};
//! use prometheus_poller::infra::RedisStore;
//!
//! let store = RedisStore::connect("redis://localhost:6379/1").await?;
//! let mut poller = LeaderPoller::<i64>::new(|s| {
//!     s.set_store(store);
//!     s.subject = "id test".into();
//! })
//! .await?;
//! poller.condition(|| -> AppResult<i64> { next_pending_id() });
//! poller.run(|id: i64| process(id)).await;
//! ```
//!
//! For complete scenarios, see `tests/poller_test.rs` and
//! `tests/leader_poller_test.rs`.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Core polling primitives, traits and errors.
pub mod core;
/// Configuration models for pollers and leases.
pub mod config;
/// Builders to construct pollers from configuration.
pub mod builders;
/// Infrastructure adapters for shared key-value stores.
pub mod infra;
/// Retry-until-success one-time initialization.
pub mod once;
/// Runtime adapters.
pub mod runtime;
/// Shared utilities.
pub mod util;

pub use crate::core::{LeaderPoller, Poller};
pub use once::{RetryOnce, RetryOutcome};
