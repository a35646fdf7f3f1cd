//! Fixed-interval poller with result and error subscribers.
//!
//! A [`Poller`] runs its query on a private task, starting as soon as it is
//! constructed. Each tick produces either a populated state or an error, and
//! the outcome is handed to every subscriber registered with
//! [`Poller::then`] or [`Poller::catch`] before the next query starts.
//!
//! Publishing waits for the subscribers: each one owns a single-slot channel
//! and the loop awaits a free slot, so a slow subscriber slows polling down
//! and a tick produced before anyone subscribed waits for the first
//! subscriber instead of being dropped.
//!
//! ```rust
//! use prometheus_poller::core::{AppResult, Poller};
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let poller = Poller::new(|ids: &mut Vec<u64>| -> AppResult<()> {
//!     ids.push(1);
//!     Ok(())
//! });
//! poller.setting(|s| s.interval = Duration::from_millis(10));
//! poller
//!     .then(|ids| println!("read {ids:?}"))
//!     .catch(|err| eprintln!("query failed: {err}"));
//!
//! tokio::time::sleep(Duration::from_millis(35)).await;
//! poller.stop();
//! poller.join().await;
//! # }
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use super::{PollQuery, SharedError};
use crate::runtime::TokioSpawner;

/// Interval used until [`Poller::setting`] changes it.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Mutable poller settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollerSettings {
    /// Sleep between two queries.
    pub interval: Duration,
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Counters describing what a poller has done so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollerStats {
    /// Queries run.
    pub ticks: u64,
    /// Results passed to a `then` callback, counted once per callback.
    pub results: u64,
    /// Errors passed to a `catch` callback, counted once per callback.
    pub errors: u64,
}

#[derive(Debug, Default)]
struct Counters {
    ticks: AtomicU64,
    results: Arc<AtomicU64>,
    errors: Arc<AtomicU64>,
}

/// Subscriber channels of one kind.
struct Subscribers<V> {
    senders: Mutex<Vec<mpsc::Sender<V>>>,
}

impl<V> Subscribers<V> {
    fn new() -> Self {
        Self {
            senders: Mutex::new(Vec::new()),
        }
    }

    fn add(&self, tx: mpsc::Sender<V>) {
        self.senders.lock().push(tx);
    }

    fn clear(&self) {
        self.senders.lock().clear();
    }

    fn live(&self) -> Vec<mpsc::Sender<V>> {
        let mut senders = self.senders.lock();
        senders.retain(|tx| !tx.is_closed());
        senders.clone()
    }
}

struct Shared<T> {
    settings: Mutex<PollerSettings>,
    results: Subscribers<T>,
    errors: Subscribers<SharedError>,
    subscribed: Notify,
    counters: Counters,
}

/// Runs a query on a fixed interval and fans its outcomes out to subscribers.
///
/// Dropping the poller stops it.
pub struct Poller<T> {
    shared: Arc<Shared<T>>,
    cancel: CancellationToken,
    stopped: AtomicBool,
    spawner: TokioSpawner,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl<T> Poller<T>
where
    T: Default + Clone + Send + 'static,
{
    /// Start polling `query` on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a tokio runtime.
    pub fn new<Q>(query: Q) -> Self
    where
        Q: PollQuery<T>,
    {
        Self::with_spawner(TokioSpawner::current(), query)
    }

    /// Start polling `query` on the runtime behind `spawner`.
    pub fn with_spawner<Q>(spawner: TokioSpawner, query: Q) -> Self
    where
        Q: PollQuery<T>,
    {
        let shared = Arc::new(Shared {
            settings: Mutex::new(PollerSettings::default()),
            results: Subscribers::new(),
            errors: Subscribers::new(),
            subscribed: Notify::new(),
            counters: Counters::default(),
        });
        let cancel = CancellationToken::new();
        let handle = spawner.spawn(poll_loop(Arc::clone(&shared), query, cancel.clone()));
        debug!("poller started");

        Self {
            shared,
            cancel,
            stopped: AtomicBool::new(false),
            spawner,
            tasks: Mutex::new(vec![handle]),
        }
    }

    /// Change the settings. The new interval applies from the next sleep on.
    pub fn setting<F>(&self, configure: F) -> &Self
    where
        F: FnOnce(&mut PollerSettings),
    {
        let mut settings = self.shared.settings.lock();
        configure(&mut settings);
        debug!(interval_ms = settings.interval.as_millis(), "poller settings changed");
        self
    }

    /// Current settings.
    pub fn settings(&self) -> PollerSettings {
        self.shared.settings.lock().clone()
    }

    /// Subscribe to every successfully populated state. The callback runs on
    /// its own task until the poller stops.
    pub fn then<F>(&self, on_result: F) -> &Self
    where
        F: FnMut(T) + Send + 'static,
    {
        let rx = self.subscribe(&self.shared.results);
        let delivered = Arc::clone(&self.shared.counters.results);
        let handle = self
            .spawner
            .spawn(deliver(rx, on_result, self.cancel.clone(), delivered, "result"));
        self.tasks.lock().push(handle);
        self
    }

    /// Subscribe to every query failure. The callback runs on its own task
    /// until the poller stops.
    pub fn catch<F>(&self, on_error: F) -> &Self
    where
        F: FnMut(SharedError) + Send + 'static,
    {
        let rx = self.subscribe(&self.shared.errors);
        let delivered = Arc::clone(&self.shared.counters.errors);
        let handle = self
            .spawner
            .spawn(deliver(rx, on_error, self.cancel.clone(), delivered, "error"));
        self.tasks.lock().push(handle);
        self
    }

    fn subscribe<V>(&self, subscribers: &Subscribers<V>) -> mpsc::Receiver<V> {
        let (tx, rx) = mpsc::channel(1);
        if !self.cancel.is_cancelled() {
            subscribers.add(tx);
            self.shared.subscribed.notify_one();
        }
        rx
    }
}

impl<T> Poller<T> {
    /// Stop polling. Nothing is delivered to any subscriber afterwards.
    /// Calling it again has no effect.
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        self.cancel.cancel();
        self.shared.results.clear();
        self.shared.errors.clear();
        info!("poller stopped");
    }

    /// Whether [`stop`](Self::stop) was called.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Wait for the polling task and every subscriber task to finish. Only
    /// returns once the poller is stopped.
    pub async fn join(&self) {
        let handles: Vec<_> = self.tasks.lock().drain(..).collect();
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "poller task panicked");
            }
        }
    }

    /// Counters of ticks and delivered outcomes.
    pub fn stats(&self) -> PollerStats {
        let c = &self.shared.counters;
        PollerStats {
            ticks: c.ticks.load(Ordering::Relaxed),
            results: c.results.load(Ordering::Relaxed),
            errors: c.errors.load(Ordering::Relaxed),
        }
    }
}

impl<T> Drop for Poller<T> {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn poll_loop<T, Q>(shared: Arc<Shared<T>>, query: Q, cancel: CancellationToken)
where
    T: Default + Clone + Send + 'static,
    Q: PollQuery<T>,
{
    loop {
        let mut state = T::default();
        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            outcome = query.query(&mut state) => outcome,
        };
        shared.counters.ticks.fetch_add(1, Ordering::Relaxed);

        let published = match outcome {
            Ok(()) => publish(&shared.results, &shared.subscribed, state, &cancel).await,
            Err(e) => {
                debug!(error = %e, "poll query failed");
                publish(&shared.errors, &shared.subscribed, SharedError::new(e), &cancel).await
            }
        };
        if !published {
            break;
        }

        let interval = shared.settings.lock().interval;
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(interval) => {}
        }
    }
    debug!("poll loop exited");
}

/// Hand `value` to every live subscriber, waiting for the first subscriber
/// if there is none yet. Returns `false` once the poller is cancelled.
async fn publish<V: Clone>(
    subscribers: &Subscribers<V>,
    subscribed: &Notify,
    value: V,
    cancel: &CancellationToken,
) -> bool {
    loop {
        let senders = subscribers.live();
        if senders.is_empty() {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return false,
                () = subscribed.notified() => continue,
            }
        }

        for tx in senders {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return false,
                sent = tx.send(value.clone()) => {
                    if sent.is_err() {
                        trace!("subscriber went away");
                    }
                }
            }
        }
        return true;
    }
}

/// Feed received values to `callback` until cancelled. A value still
/// buffered when the poller stops is dropped and not counted.
async fn deliver<V, F>(
    mut rx: mpsc::Receiver<V>,
    mut callback: F,
    cancel: CancellationToken,
    delivered: Arc<AtomicU64>,
    kind: &'static str,
) where
    F: FnMut(V),
{
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            received = rx.recv() => match received {
                Some(value) => {
                    delivered.fetch_add(1, Ordering::Relaxed);
                    callback(value);
                }
                None => break,
            },
        }
    }
    trace!(kind, "subscriber exited");
}
