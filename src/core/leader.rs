//! Soft-leader polling over a shared key-value store.
//!
//! Every [`LeaderPoller`] competing for the same subject writes its own lease
//! token to the store when it starts and again on every refresh. A cycle only
//! runs the task when the store still holds this instance's token, so the
//! instance that wrote last is the leader. This is advisory scheduling: there
//! is no compare-and-swap, so two instances refreshing in the same window can
//! both believe they lead until the next refresh settles it.
//!
//! Each cycle moves through these states:
//!
//! ```text
//! WAIT (unless delayed)
//!   -> VERIFY_LEASE -> LEASE_LOST ------------------------------+
//!                   -> LEASE_HELD -> EVALUATE_CONDITIONS        |
//!                                    -> CONDITIONS_FAILED ------+
//!                                    -> CONDITIONS_MET -> RUN_TASK
//! WAIT (if delayed)  <------------------------------------------+
//! ```
//!
//! ```rust,no_run
//! use prometheus_poller::core::{AppResult, LeaderPoller};
//! use prometheus_poller::infra::InMemoryStore;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), prometheus_poller::core::PollerError> {
//! let mut poller = LeaderPoller::<i64>::new(|s| {
//!     s.set_store(InMemoryStore::new());
//!     s.subject = "id test".into();
//!     s.interval = Duration::from_secs(2);
//! })
//! .await?;
//! poller.condition(|| -> AppResult<i64> { Ok(42) });
//! poller.run(|id: i64| println!("{id}")).await;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::lease::LeaderLease;
use super::{AppResult, Condition, KvStore, LeaderTask, PollerError, SharedError};
use crate::runtime::TokioSpawner;

/// Subject used when none is configured.
pub const DEFAULT_SUBJECT: &str = "prometheus_poller.leader";
/// Cycle interval used when none is configured.
pub const DEFAULT_LEADER_INTERVAL: Duration = Duration::from_secs(10);
/// Lease refresh cadence used when none is configured.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(600);

/// Receives failures a leader poller would otherwise only log.
pub type ErrorSink = Arc<dyn Fn(SharedError) + Send + Sync>;

/// Settings applied once when a [`LeaderPoller`] is constructed.
#[derive(Clone)]
pub struct LeaderPollerSettings {
    /// Shared store. Required.
    pub store: Option<Arc<dyn KvStore>>,
    /// Key of the lease slot shared by all competing instances.
    pub subject: String,
    /// Time slept once per cycle.
    pub interval: Duration,
    /// Run the cycle before sleeping instead of after.
    pub delayed: bool,
    /// How often this instance rewrites its lease token.
    pub refresh_interval: Duration,
    /// Optional expiry of the lease entry in the store.
    pub lease_ttl: Option<Duration>,
    /// Optional receiver of store and condition failures.
    pub error_sink: Option<ErrorSink>,
}

impl Default for LeaderPollerSettings {
    fn default() -> Self {
        Self {
            store: None,
            subject: DEFAULT_SUBJECT.to_owned(),
            interval: DEFAULT_LEADER_INTERVAL,
            delayed: false,
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            lease_ttl: None,
            error_sink: None,
        }
    }
}

impl fmt::Debug for LeaderPollerSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LeaderPollerSettings")
            .field("store", &self.store.as_ref().map(|_| "<store>"))
            .field("subject", &self.subject)
            .field("interval", &self.interval)
            .field("delayed", &self.delayed)
            .field("refresh_interval", &self.refresh_interval)
            .field("lease_ttl", &self.lease_ttl)
            .field("error_sink", &self.error_sink.as_ref().map(|_| "<sink>"))
            .finish()
    }
}

impl LeaderPollerSettings {
    /// Use `store` as the shared store.
    pub fn set_store<S: KvStore + 'static>(&mut self, store: S) {
        self.store = Some(Arc::new(store));
    }

    /// Forward store and condition failures to `sink`.
    pub fn set_error_sink<F>(&mut self, sink: F)
    where
        F: Fn(SharedError) + Send + Sync + 'static,
    {
        self.error_sink = Some(Arc::new(sink));
    }

    /// Check the values a poller cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`PollerError::MissingStore`] without a store and
    /// [`PollerError::InvalidConfig`] for an empty subject, a zero interval or
    /// a lease TTL that does not outlast the refresh interval.
    pub fn validate(&self) -> Result<(), PollerError> {
        if self.store.is_none() {
            return Err(PollerError::MissingStore);
        }
        if self.subject.is_empty() {
            return Err(PollerError::InvalidConfig("subject must not be empty".into()));
        }
        if self.interval.is_zero() {
            return Err(PollerError::InvalidConfig("interval must be greater than 0".into()));
        }
        if self.refresh_interval.is_zero() {
            return Err(PollerError::InvalidConfig(
                "refresh_interval must be greater than 0".into(),
            ));
        }
        if let Some(ttl) = self.lease_ttl {
            // the lease must survive until the next refresh rewrites it
            if ttl <= self.refresh_interval {
                return Err(PollerError::InvalidConfig(format!(
                    "lease_ttl ({ttl:?}) must exceed refresh_interval ({:?})",
                    self.refresh_interval
                )));
            }
        }
        Ok(())
    }
}

/// What one pass of the state machine did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The store holds another token (or none, or could not be read).
    LeaseLost,
    /// The lease was held but a condition failed.
    ConditionsFailed,
    /// The task ran.
    Ran,
}

/// Lease-gated fixed-interval task runner.
///
/// Dropping the poller stops its refresh task.
pub struct LeaderPoller<T> {
    lease: Arc<LeaderLease>,
    interval: Duration,
    delayed: bool,
    error_sink: Option<ErrorSink>,
    conditions: Vec<Box<dyn Condition<T>>>,
    cancel: CancellationToken,
    refresher: Mutex<Option<JoinHandle<()>>>,
}

impl<T> LeaderPoller<T>
where
    T: Default + Send + 'static,
{
    /// Build a poller from settings mutated by `configure`, write the initial
    /// lease token and start the refresh task on the current runtime.
    ///
    /// # Errors
    ///
    /// Fails when the settings are invalid (see
    /// [`LeaderPollerSettings::validate`]) or the initial write fails.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a tokio runtime.
    pub async fn new<F>(configure: F) -> Result<Self, PollerError>
    where
        F: FnOnce(&mut LeaderPollerSettings),
    {
        let mut settings = LeaderPollerSettings::default();
        configure(&mut settings);
        Self::from_settings(settings, TokioSpawner::current()).await
    }

    /// Build a poller from ready settings, spawning the refresh task with
    /// `spawner`.
    ///
    /// # Errors
    ///
    /// Same as [`new`](Self::new).
    pub async fn from_settings(
        settings: LeaderPollerSettings,
        spawner: TokioSpawner,
    ) -> Result<Self, PollerError> {
        settings.validate()?;
        let store = settings.store.ok_or(PollerError::MissingStore)?;
        let lease = Arc::new(LeaderLease::new(store, settings.subject, settings.lease_ttl));
        lease.refresh().await?;

        let cancel = CancellationToken::new();
        let refresher = spawner.spawn(refresh_loop(
            Arc::clone(&lease),
            settings.refresh_interval,
            settings.error_sink.clone(),
            cancel.clone(),
        ));
        info!(
            subject = %lease.subject(),
            interval_ms = settings.interval.as_millis(),
            delayed = settings.delayed,
            "leader poller started"
        );

        Ok(Self {
            lease,
            interval: settings.interval,
            delayed: settings.delayed,
            error_sink: settings.error_sink,
            conditions: Vec::new(),
            cancel,
            refresher: Mutex::new(Some(refresher)),
        })
    }

    /// Append one condition to the chain.
    pub fn condition<C>(&mut self, condition: C) -> &mut Self
    where
        C: Condition<T>,
    {
        self.conditions.push(Box::new(condition));
        self
    }

    /// Append several conditions, in order.
    pub fn conditions<I>(&mut self, conditions: I) -> &mut Self
    where
        I: IntoIterator<Item = Box<dyn Condition<T>>>,
    {
        self.conditions.extend(conditions);
        self
    }

    /// Number of conditions in the chain.
    pub fn condition_count(&self) -> usize {
        self.conditions.len()
    }

    /// Evaluate the chain in order, stopping at the first failure. On success
    /// the last condition's output is returned (`T::default()` for an empty
    /// chain); earlier outputs are discarded.
    ///
    /// # Errors
    ///
    /// Returns the error of the first failing condition.
    pub async fn check_conditions(&self) -> AppResult<T> {
        let mut output = T::default();
        for (index, condition) in self.conditions.iter().enumerate() {
            match condition.check().await {
                Ok(value) => output = value,
                Err(e) => {
                    debug!(subject = %self.lease.subject(), index, error = %e, "condition failed");
                    return Err(e);
                }
            }
        }
        Ok(output)
    }

    /// Run one pass of the state machine, without sleeping.
    pub async fn cycle<K>(&self, task: &K) -> CycleOutcome
    where
        K: LeaderTask<T> + ?Sized,
    {
        match self.lease.verify().await {
            Ok(true) => {}
            Ok(false) => {
                debug!(subject = %self.lease.subject(), "lease held by another instance");
                return CycleOutcome::LeaseLost;
            }
            Err(e) => {
                warn!(subject = %self.lease.subject(), error = %e, "failed to read lease");
                self.report(e.into());
                return CycleOutcome::LeaseLost;
            }
        }

        match self.check_conditions().await {
            Ok(input) => {
                task.run(input).await;
                CycleOutcome::Ran
            }
            Err(e) => {
                self.report(e);
                CycleOutcome::ConditionsFailed
            }
        }
    }

    /// Loop over [`cycle`](Self::cycle) until [`stop`](Self::stop) is called,
    /// sleeping the interval once per cycle: before it unless `delayed`,
    /// after it otherwise.
    pub async fn run<K>(&self, task: K)
    where
        K: LeaderTask<T>,
    {
        info!(subject = %self.lease.subject(), "leader poller running");
        loop {
            if !self.delayed && !self.pause().await {
                break;
            }
            if self.cancel.is_cancelled() {
                break;
            }
            let outcome = self.cycle(&task).await;
            debug!(subject = %self.lease.subject(), ?outcome, "cycle finished");
            if self.delayed && !self.pause().await {
                break;
            }
        }
        info!(subject = %self.lease.subject(), "leader poller stopped running");
    }

    /// Sleep one interval. Returns `false` if stopped meanwhile.
    async fn pause(&self) -> bool {
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => false,
            () = tokio::time::sleep(self.interval) => true,
        }
    }

    fn report(&self, error: anyhow::Error) {
        if let Some(sink) = &self.error_sink {
            sink(SharedError::new(error));
        }
    }
}

impl<T> LeaderPoller<T> {
    /// Overwrite the lease with a fresh token right away, claiming leadership.
    ///
    /// # Errors
    ///
    /// Returns the store failure; the local token is left unchanged.
    pub async fn refresh_now(&self) -> Result<String, PollerError> {
        Ok(self.lease.refresh().await?)
    }

    /// Whether the store currently holds this instance's token.
    ///
    /// # Errors
    ///
    /// Returns the store failure.
    pub async fn is_leader(&self) -> Result<bool, PollerError> {
        Ok(self.lease.verify().await?)
    }

    /// Token this instance last wrote.
    pub fn lease_key(&self) -> String {
        self.lease.key()
    }

    /// Shared lease subject.
    pub fn subject(&self) -> &str {
        self.lease.subject()
    }

    /// Token that stops the poller when cancelled; hand it to whoever owns
    /// shutdown while [`run`](Self::run) borrows the poller.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop refreshing and make [`run`](Self::run) return. The last written
    /// token stays in the store.
    pub fn stop(&self) {
        if self.cancel.is_cancelled() {
            return;
        }
        self.cancel.cancel();
        info!(subject = %self.lease.subject(), "leader poller stop requested");
    }

    /// Wait for the refresh task to finish after [`stop`](Self::stop).
    pub async fn join(&self) {
        let handle = self.refresher.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "lease refresh task panicked");
            }
        }
    }
}

impl<T> Drop for LeaderPoller<T> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn refresh_loop(
    lease: Arc<LeaderLease>,
    every: Duration,
    error_sink: Option<ErrorSink>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {
                if let Err(e) = lease.refresh().await {
                    warn!(subject = %lease.subject(), error = %e, "failed to refresh lease");
                    if let Some(sink) = &error_sink {
                        sink(SharedError::new(e.into()));
                    }
                }
            }
        }
    }
    debug!(subject = %lease.subject(), "lease refresh task exited");
}
