//! Shared key-value store abstraction and lease tokens.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::info;

use super::StoreError;
use crate::util::clock::now_nanos;

/// Abstraction for the shared key-value store every leader poller of a subject
/// reads and writes.
///
/// Only plain `SET`/`GET` are required. There is no compare-and-swap, so two
/// instances refreshing in the same window may both believe they hold the
/// lease; the last write wins.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Store `value` under `key`, replacing any previous value. With a `ttl`
    /// the entry disappears once it elapses.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), StoreError>;

    /// Read the value under `key`, `None` if absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
}

/// Generate a new lease generation token.
///
/// The token starts with the current timestamp in nanoseconds; a random suffix
/// keeps tokens of instances started in the same instant distinct.
#[must_use]
pub fn new_lease_token() -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", now_nanos(), &suffix[..8])
}

/// Whether the token read from the store proves the local instance holds the
/// lease. Absence counts as lost.
#[must_use]
pub fn holds_lease(local: &str, remote: Option<&str>) -> bool {
    remote.is_some_and(|r| r == local)
}

/// The lease slot of one leader poller: the shared subject and the token this
/// instance last wrote there.
pub(crate) struct LeaderLease {
    store: Arc<dyn KvStore>,
    subject: String,
    ttl: Option<Duration>,
    key: Mutex<String>,
}

impl LeaderLease {
    pub(crate) fn new(store: Arc<dyn KvStore>, subject: String, ttl: Option<Duration>) -> Self {
        Self {
            store,
            subject,
            ttl,
            key: Mutex::new(String::new()),
        }
    }

    pub(crate) fn subject(&self) -> &str {
        &self.subject
    }

    /// Token this instance last wrote.
    pub(crate) fn key(&self) -> String {
        self.key.lock().clone()
    }

    /// Overwrite the subject with a fresh token. The local copy only changes
    /// once the write went through.
    pub(crate) async fn refresh(&self) -> Result<String, StoreError> {
        let token = new_lease_token();
        self.store.set(&self.subject, &token, self.ttl).await?;
        self.key.lock().clone_from(&token);
        info!(subject = %self.subject, key = %token, "lease key refreshed");
        Ok(token)
    }

    /// Read the subject back and compare it with the local token.
    pub(crate) async fn verify(&self) -> Result<bool, StoreError> {
        let remote = self.store.get(&self.subject).await?;
        let local = self.key.lock();
        Ok(holds_lease(&local, remote.as_deref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokens_are_distinct() {
        let a = new_lease_token();
        let b = new_lease_token();
        assert_ne!(a, b);
        assert!(a.split('-').next().unwrap().parse::<u128>().is_ok());
    }

    #[tokio::test]
    async fn test_lease_refresh_and_verify() {
        let store = crate::infra::InMemoryStore::new();
        let a = LeaderLease::new(Arc::new(store.clone()), "jobA".into(), None);
        let b = LeaderLease::new(Arc::new(store.clone()), "jobA".into(), None);

        assert!(!a.verify().await.unwrap());
        let token = a.refresh().await.unwrap();
        assert_eq!(a.key(), token);
        assert!(a.verify().await.unwrap());

        b.refresh().await.unwrap();
        assert!(b.verify().await.unwrap());
        assert!(!a.verify().await.unwrap());
        assert_eq!(a.subject(), "jobA");
    }

    #[test]
    fn test_holds_lease() {
        assert!(holds_lease("1-a", Some("1-a")));
        assert!(!holds_lease("1-a", Some("2-b")));
        assert!(!holds_lease("1-a", None));
    }
}
