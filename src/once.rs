//! Retry-until-success, one-time initialization.
//!
//! [`RetryOnce`] builds a value by repeatedly running a fallible action, and
//! does so at most once per instance: concurrent callers wait for the single
//! execution and then all observe the same stored outcome. It is typically
//! used to construct a dependency (a store client, a connection) before a
//! [`Poller`](crate::core::Poller) or [`LeaderPoller`](crate::core::LeaderPoller)
//! starts.
//!
//! Two modes are offered and they fail differently:
//!
//! - [`RetryOnce::keep`] retries forever and only returns a value the action
//!   accepted.
//! - [`RetryOnce::times`] gives up after a budget and returns
//!   [`RetryOutcome::Exhausted`] carrying whatever the last attempt left behind.
//!
//! # Examples
//!
//! ```
//! use prometheus_poller::RetryOnce;
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let client: RetryOnce<String> = RetryOnce::new().with_backoff(Duration::from_millis(1));
//!
//! let value = client
//!     .keep(|name: &mut String| {
//!         name.push_str("connected");
//!         Ok(())
//!     })
//!     .await;
//! assert_eq!(value, "connected");
//! # }
//! ```

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Notify, OnceCell};

use crate::core::{AppResult, SharedError};
use crate::runtime::TokioSpawner;

/// Backoff between two failed attempts unless configured otherwise.
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);

/// Result of the single execution of a [`RetryOnce`].
#[derive(Debug)]
pub enum RetryOutcome<T> {
    /// The action accepted the value.
    Succeeded {
        /// The populated value.
        value: T,
        /// Attempts made, including the successful one.
        attempts: u32,
    },
    /// The attempt budget ran out. `value` is whatever the last failed attempt
    /// left behind, or `T::default()` if it made no change.
    Exhausted {
        /// The possibly partial value.
        value: T,
        /// Attempts made.
        attempts: u32,
        /// Error of the last attempt, `None` for a zero budget.
        last_error: Option<SharedError>,
    },
}

impl<T> RetryOutcome<T> {
    /// The stored value, whether or not the action succeeded.
    pub const fn value(&self) -> &T {
        match self {
            Self::Succeeded { value, .. } | Self::Exhausted { value, .. } => value,
        }
    }

    /// Number of attempts made.
    pub const fn attempts(&self) -> u32 {
        match self {
            Self::Succeeded { attempts, .. } | Self::Exhausted { attempts, .. } => *attempts,
        }
    }

    /// Whether the action succeeded.
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }

    /// The value, only if the action succeeded.
    pub const fn success(&self) -> Option<&T> {
        match self {
            Self::Succeeded { value, .. } => Some(value),
            Self::Exhausted { .. } => None,
        }
    }
}

/// Memoized retry-until-success initializer.
///
/// The first call to [`keep`](Self::keep) or [`times`](Self::times) fixes the
/// outcome for the lifetime of the instance; later calls, whichever mode they
/// use, return it without running their action.
///
/// The retry loop runs on its own task. A caller that is cancelled while it
/// waits (dropped, timed out, aborted) does not stop the loop, and the
/// callers still waiting receive its outcome.
pub struct RetryOnce<T> {
    shared: Arc<Shared<T>>,
    backoff: Duration,
}

struct Shared<T> {
    cell: OnceCell<RetryOutcome<T>>,
    started: AtomicBool,
    attempts: AtomicU32,
    done: Notify,
}

impl<T> Default for RetryOnce<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: fmt::Debug> fmt::Debug for RetryOnce<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryOnce")
            .field("outcome", &self.shared.cell.get())
            .field("backoff", &self.backoff)
            .finish()
    }
}

impl<T> RetryOnce<T> {
    /// Create an instance with the default one second backoff.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                cell: OnceCell::new(),
                started: AtomicBool::new(false),
                attempts: AtomicU32::new(0),
                done: Notify::new(),
            }),
            backoff: DEFAULT_BACKOFF,
        }
    }

    /// Use a different fixed backoff between failed attempts.
    #[must_use]
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Outcome of the execution, if it has completed.
    pub fn get(&self) -> Option<&RetryOutcome<T>> {
        self.shared.cell.get()
    }

    /// Whether the single execution has completed.
    pub fn is_completed(&self) -> bool {
        self.shared.cell.initialized()
    }
}

impl<T> RetryOnce<T>
where
    T: Default + Send + Sync + 'static,
{
    /// Retry `action` until it succeeds, sleeping the backoff after every
    /// failure, and return the populated value.
    ///
    /// Never returns while the action keeps failing. If the outcome was
    /// already fixed by an exhausted [`times`](Self::times) call, that value is
    /// returned as is.
    ///
    /// # Panics
    ///
    /// Panics when polled outside of a tokio runtime.
    pub async fn keep<F>(&self, action: F) -> &T
    where
        F: FnMut(&mut T) -> AppResult<()> + Send + 'static,
    {
        let run = keep_loop(action, self.backoff, Arc::clone(&self.shared));
        self.run_once(run).await.value()
    }

    /// Run `action` at most `count` times, sleeping the backoff between
    /// failures.
    ///
    /// Exhaustion is not an error: the returned outcome is
    /// [`RetryOutcome::Exhausted`] and its value keeps whatever the last
    /// attempt wrote.
    ///
    /// # Panics
    ///
    /// Panics when polled outside of a tokio runtime.
    pub async fn times<F>(&self, count: u32, action: F) -> &RetryOutcome<T>
    where
        F: FnMut(&mut T) -> AppResult<()> + Send + 'static,
    {
        let run = times_loop(count, action, self.backoff, Arc::clone(&self.shared));
        self.run_once(run).await
    }

    /// Start `run` unless a loop already started, then wait for the stored
    /// outcome.
    async fn run_once<R>(&self, run: R) -> &RetryOutcome<T>
    where
        R: Future<Output = RetryOutcome<T>> + Send + 'static,
    {
        let mut run = Some(run);
        loop {
            let notified = self.shared.done.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(outcome) = self.shared.cell.get() {
                return outcome;
            }
            if let Some(run) = run.take() {
                if !self.shared.started.swap(true, Ordering::AcqRel) {
                    drive(Arc::clone(&self.shared), run);
                }
            }
            notified.await;
        }
    }
}

/// Run the loop on its own task and publish its outcome. A panicking action
/// is stored as an exhausted outcome so waiters are released.
fn drive<T, R>(shared: Arc<Shared<T>>, run: R)
where
    T: Default + Send + Sync + 'static,
    R: Future<Output = RetryOutcome<T>> + Send + 'static,
{
    let spawner = TokioSpawner::current();
    let worker_shared = Arc::clone(&shared);
    let worker = spawner.spawn(async move {
        let outcome = run.await;
        let _ = worker_shared.cell.set(outcome);
    });
    spawner.spawn(async move {
        if let Err(e) = worker.await {
            tracing::error!(error = %e, "retry-once action panicked");
            let _ = shared.cell.set(RetryOutcome::Exhausted {
                value: T::default(),
                attempts: shared.attempts.load(Ordering::Acquire),
                last_error: Some(SharedError::new(anyhow::anyhow!(
                    "retry-once action panicked: {e}"
                ))),
            });
        }
        shared.done.notify_waiters();
    });
}

async fn keep_loop<T, F>(mut action: F, backoff: Duration, shared: Arc<Shared<T>>) -> RetryOutcome<T>
where
    T: Default,
    F: FnMut(&mut T) -> AppResult<()>,
{
    let mut value = T::default();
    loop {
        let attempts = shared.attempts.fetch_add(1, Ordering::AcqRel).saturating_add(1);
        match action(&mut value) {
            Ok(()) => {
                tracing::debug!(attempts, "retry-once action succeeded");
                return RetryOutcome::Succeeded { value, attempts };
            }
            Err(e) => {
                tracing::warn!(attempts, error = %e, "retry-once action failed, retrying");
                tokio::time::sleep(backoff).await;
            }
        }
    }
}

async fn times_loop<T, F>(
    count: u32,
    mut action: F,
    backoff: Duration,
    shared: Arc<Shared<T>>,
) -> RetryOutcome<T>
where
    T: Default,
    F: FnMut(&mut T) -> AppResult<()>,
{
    let mut value = T::default();
    let mut last_error = None;
    for attempt in 1..=count {
        shared.attempts.store(attempt, Ordering::Release);
        match action(&mut value) {
            Ok(()) => {
                tracing::debug!(attempts = attempt, "retry-once action succeeded");
                return RetryOutcome::Succeeded {
                    value,
                    attempts: attempt,
                };
            }
            Err(e) => {
                tracing::warn!(attempt, count, error = %e, "retry-once action failed");
                last_error = Some(SharedError::new(e));
                if attempt < count {
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
    tracing::error!(count, "retry-once attempts exhausted");
    RetryOutcome::Exhausted {
        value,
        attempts: count,
        last_error,
    }
}
