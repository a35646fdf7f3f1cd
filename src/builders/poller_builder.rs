//! Builders to construct running pollers from configuration.

use std::sync::Arc;

use crate::config::{LeaderPollerConfig, PollerConfig};
use crate::core::{KvStore, LeaderPoller, LeaderPollerSettings, PollQuery, Poller, PollerError};
use crate::runtime::TokioSpawner;

/// Validate `cfg` and start a poller for `query` on the current runtime.
///
/// # Errors
///
/// Returns [`PollerError::InvalidConfig`] when the configuration is rejected.
///
/// # Panics
///
/// Panics when called outside of a tokio runtime.
pub fn build_poller<T, Q>(cfg: &PollerConfig, query: Q) -> Result<Poller<T>, PollerError>
where
    T: Default + Clone + Send + 'static,
    Q: PollQuery<T>,
{
    cfg.validate()
        .map_err(|e| PollerError::InvalidConfig(format!("poller config invalid: {e}")))?;
    let poller = Poller::new(query);
    poller.setting(|s| cfg.apply(s));
    Ok(poller)
}

/// Validate `cfg` and construct a leader poller over `store`.
///
/// # Errors
///
/// Returns [`PollerError::InvalidConfig`] when the configuration is rejected,
/// or the store failure of the initial lease write.
///
/// # Panics
///
/// Panics when called outside of a tokio runtime.
pub async fn build_leader_poller<T>(
    cfg: &LeaderPollerConfig,
    store: Arc<dyn KvStore>,
) -> Result<LeaderPoller<T>, PollerError>
where
    T: Default + Send + 'static,
{
    cfg.validate()
        .map_err(|e| PollerError::InvalidConfig(format!("leader config invalid: {e}")))?;
    let mut settings = LeaderPollerSettings {
        store: Some(store),
        ..LeaderPollerSettings::default()
    };
    cfg.apply(&mut settings);
    LeaderPoller::from_settings(settings, TokioSpawner::current()).await
}
