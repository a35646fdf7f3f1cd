//! Serializable poller configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::{
    LeaderPollerSettings, PollerSettings, DEFAULT_LEADER_INTERVAL, DEFAULT_POLL_INTERVAL,
    DEFAULT_REFRESH_INTERVAL, DEFAULT_SUBJECT,
};

/// Environment variable holding the poller interval in milliseconds.
pub const ENV_POLLER_INTERVAL_MS: &str = "POLLER_INTERVAL_MS";
/// Environment variable holding the lease subject.
pub const ENV_LEADER_SUBJECT: &str = "LEADER_SUBJECT";
/// Environment variable holding the leader cycle interval in milliseconds.
pub const ENV_LEADER_INTERVAL_MS: &str = "LEADER_INTERVAL_MS";
/// Environment variable holding the delayed flag (`true`/`false`).
pub const ENV_LEADER_DELAYED: &str = "LEADER_DELAYED";
/// Environment variable holding the refresh cadence in seconds.
pub const ENV_LEADER_REFRESH_SECS: &str = "LEADER_REFRESH_SECS";
/// Environment variable holding the lease TTL in seconds.
pub const ENV_LEADER_LEASE_TTL_SECS: &str = "LEADER_LEASE_TTL_SECS";

/// Plain poller configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollerConfig {
    /// Interval between queries in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub interval_ms: u64,
}

/// Leader poller configuration. The store is wired separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderPollerConfig {
    /// Lease subject.
    #[serde(default = "default_subject")]
    pub subject: String,
    /// Cycle interval in milliseconds.
    #[serde(default = "default_leader_interval_ms")]
    pub interval_ms: u64,
    /// Run each cycle before sleeping.
    #[serde(default)]
    pub delayed: bool,
    /// Lease refresh cadence in seconds.
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    /// Optional lease TTL in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lease_ttl_secs: Option<u64>,
}

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Plain poller section.
    #[serde(default)]
    pub poller: PollerConfig,
    /// Leader poller section.
    #[serde(default)]
    pub leader: LeaderPollerConfig,
}

fn default_poll_interval_ms() -> u64 {
    duration_ms(DEFAULT_POLL_INTERVAL)
}

fn default_leader_interval_ms() -> u64 {
    duration_ms(DEFAULT_LEADER_INTERVAL)
}

fn default_refresh_interval_secs() -> u64 {
    DEFAULT_REFRESH_INTERVAL.as_secs()
}

fn default_subject() -> String {
    DEFAULT_SUBJECT.to_owned()
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Default for LeaderPollerConfig {
    fn default() -> Self {
        Self {
            subject: default_subject(),
            interval_ms: default_leader_interval_ms(),
            delayed: false,
            refresh_interval_secs: default_refresh_interval_secs(),
            lease_ttl_secs: None,
        }
    }
}

impl PollerConfig {
    /// Validate poller configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.interval_ms == 0 {
            return Err("interval_ms must be greater than 0".into());
        }
        Ok(())
    }

    /// Copy the values into runtime settings.
    pub fn apply(&self, settings: &mut PollerSettings) {
        settings.interval = Duration::from_millis(self.interval_ms);
    }
}

impl LeaderPollerConfig {
    /// Validate leader configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.subject.trim().is_empty() {
            return Err("subject must not be empty".into());
        }
        if self.interval_ms == 0 {
            return Err("interval_ms must be greater than 0".into());
        }
        if self.refresh_interval_secs == 0 {
            return Err("refresh_interval_secs must be greater than 0".into());
        }
        if let Some(ttl) = self.lease_ttl_secs {
            // a lease that expires before it is refreshed leaves the subject empty
            if ttl <= self.refresh_interval_secs {
                return Err(format!(
                    "lease_ttl_secs ({ttl}) must exceed refresh_interval_secs ({})",
                    self.refresh_interval_secs
                ));
            }
        }
        Ok(())
    }

    /// Copy the values into runtime settings, leaving store and error sink
    /// untouched.
    pub fn apply(&self, settings: &mut LeaderPollerSettings) {
        settings.subject.clone_from(&self.subject);
        settings.interval = Duration::from_millis(self.interval_ms);
        settings.delayed = self.delayed;
        settings.refresh_interval = Duration::from_secs(self.refresh_interval_secs);
        settings.lease_ttl = self.lease_ttl_secs.map(Duration::from_secs);
    }
}

impl PollingConfig {
    /// Validate both sections.
    pub fn validate(&self) -> Result<(), String> {
        self.poller
            .validate()
            .map_err(|e| format!("poller invalid: {e}"))?;
        self.leader
            .validate()
            .map_err(|e| format!("leader invalid: {e}"))
    }

    /// Parse configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Build configuration from the process environment, after loading a
    /// `.env` file if one exists. Unset variables keep their defaults.
    pub fn from_env() -> Result<Self, String> {
        // a missing .env file is normal outside of development
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from any key lookup, e.g. a map in tests.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        if let Some(v) = lookup(ENV_POLLER_INTERVAL_MS) {
            cfg.poller.interval_ms = parse(ENV_POLLER_INTERVAL_MS, &v)?;
        }
        if let Some(v) = lookup(ENV_LEADER_SUBJECT) {
            cfg.leader.subject = v;
        }
        if let Some(v) = lookup(ENV_LEADER_INTERVAL_MS) {
            cfg.leader.interval_ms = parse(ENV_LEADER_INTERVAL_MS, &v)?;
        }
        if let Some(v) = lookup(ENV_LEADER_DELAYED) {
            cfg.leader.delayed = parse(ENV_LEADER_DELAYED, &v)?;
        }
        if let Some(v) = lookup(ENV_LEADER_REFRESH_SECS) {
            cfg.leader.refresh_interval_secs = parse(ENV_LEADER_REFRESH_SECS, &v)?;
        }
        if let Some(v) = lookup(ENV_LEADER_LEASE_TTL_SECS) {
            cfg.leader.lease_ttl_secs = Some(parse(ENV_LEADER_LEASE_TTL_SECS, &v)?);
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

fn parse<V>(key: &str, raw: &str) -> Result<V, String>
where
    V: std::str::FromStr,
    V::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|e| format!("{key}: cannot parse `{raw}`: {e}"))
}
