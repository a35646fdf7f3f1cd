//! Traits for the user-supplied pieces a poller drives.
//!
//! Each trait has a blanket implementation for plain synchronous closures, so
//! most callers never implement them by hand:
//!
//! ```rust
//! use prometheus_poller::core::{AppResult, Condition};
//!
//! fn assert_condition<C: Condition<u32>>(_: &C) {}
//!
//! let ready = || -> AppResult<u32> { Ok(7) };
//! assert_condition(&ready);
//! ```
//!
//! Implement the trait directly when the work needs to `.await`, e.g. a
//! database query:
//!
//! ```rust,ignore
//! use async_trait::async_trait;
//! use prometheus_poller::core::{AppResult, PollQuery};
//!
//! struct PendingJobs { pool: sqlx::PgPool }
//!
//! #[async_trait]
//! impl PollQuery<Vec<i64>> for PendingJobs {
//!     async fn query(&self, state: &mut Vec<i64>) -> AppResult<()> {
//!         *state = sqlx::query_scalar("SELECT id FROM jobs WHERE done = false")
//!             .fetch_all(&self.pool)
//!             .await?;
//!         Ok(())
//!     }
//! }
//! ```

use async_trait::async_trait;

use super::AppResult;

/// Query run by a [`Poller`](super::Poller) on every tick.
///
/// The query receives a fresh `T::default()` and populates it. Returning an
/// error publishes the error instead of the state.
#[async_trait]
pub trait PollQuery<T>: Send + Sync + 'static {
    /// Populate `state`, or fail.
    async fn query(&self, state: &mut T) -> AppResult<()>;
}

#[async_trait]
impl<T, F> PollQuery<T> for F
where
    T: Send,
    F: Fn(&mut T) -> AppResult<()> + Send + Sync + 'static,
{
    async fn query(&self, state: &mut T) -> AppResult<()> {
        self(state)
    }
}

/// A precondition evaluated before a [`LeaderPoller`](super::LeaderPoller)
/// runs its task. Its output becomes the task input when it is the last
/// condition of the chain.
#[async_trait]
pub trait Condition<T>: Send + Sync + 'static {
    /// Evaluate the condition.
    async fn check(&self) -> AppResult<T>;
}

#[async_trait]
impl<T, F> Condition<T> for F
where
    T: Send,
    F: Fn() -> AppResult<T> + Send + Sync + 'static,
{
    async fn check(&self) -> AppResult<T> {
        self()
    }
}

/// Work executed by a [`LeaderPoller`](super::LeaderPoller) once per cycle in
/// which the lease is held and every condition passed.
#[async_trait]
pub trait LeaderTask<T>: Send + Sync {
    /// Run the task with the condition chain's output.
    async fn run(&self, input: T);
}

#[async_trait]
impl<T, F> LeaderTask<T> for F
where
    T: Send + 'static,
    F: Fn(T) + Send + Sync,
{
    async fn run(&self, input: T) {
        self(input);
    }
}
