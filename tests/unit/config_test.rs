//! Tests for configuration validation and loading

use std::collections::HashMap;
use std::time::Duration;

use prometheus_poller::config::poller::{
    ENV_LEADER_DELAYED, ENV_LEADER_INTERVAL_MS, ENV_LEADER_LEASE_TTL_SECS, ENV_LEADER_SUBJECT,
    ENV_POLLER_INTERVAL_MS,
};
use prometheus_poller::config::{LeaderPollerConfig, PollerConfig, PollingConfig};
use prometheus_poller::core::{
    LeaderPollerSettings, PollerSettings, DEFAULT_LEADER_INTERVAL, DEFAULT_SUBJECT,
};

fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
        .collect();
    move |key| map.get(key).cloned()
}

#[test]
fn test_defaults_are_valid() {
    let cfg = PollingConfig::default();
    assert!(cfg.validate().is_ok());
    assert_eq!(cfg.poller.interval_ms, 1000);
    assert_eq!(cfg.leader.subject, DEFAULT_SUBJECT);
    assert_eq!(cfg.leader.refresh_interval_secs, 600);
    assert!(!cfg.leader.delayed);
}

#[test]
fn test_poller_config_invalid_interval() {
    let invalid = PollerConfig { interval_ms: 0 };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_leader_config_invalid_subject() {
    let invalid = LeaderPollerConfig {
        subject: "  ".into(),
        ..LeaderPollerConfig::default()
    };
    assert!(invalid.validate().is_err());
}

#[test]
fn test_leader_config_ttl_must_exceed_refresh() {
    let mut cfg = LeaderPollerConfig {
        refresh_interval_secs: 60,
        lease_ttl_secs: Some(60),
        ..LeaderPollerConfig::default()
    };
    let err = cfg.validate().unwrap_err();
    assert!(err.contains("lease_ttl_secs"));

    cfg.lease_ttl_secs = Some(90);
    assert!(cfg.validate().is_ok());
}

#[test]
fn test_apply_copies_values() {
    let mut settings = PollerSettings::default();
    PollerConfig { interval_ms: 250 }.apply(&mut settings);
    assert_eq!(settings.interval, Duration::from_millis(250));

    let cfg = LeaderPollerConfig {
        subject: "jobA".into(),
        interval_ms: 2000,
        delayed: true,
        refresh_interval_secs: 30,
        lease_ttl_secs: Some(45),
    };
    let mut settings = LeaderPollerSettings::default();
    cfg.apply(&mut settings);
    assert_eq!(settings.subject, "jobA");
    assert_eq!(settings.interval, Duration::from_secs(2));
    assert!(settings.delayed);
    assert_eq!(settings.refresh_interval, Duration::from_secs(30));
    assert_eq!(settings.lease_ttl, Some(Duration::from_secs(45)));
    assert!(settings.store.is_none());
}

#[test]
fn test_from_json_fills_defaults() {
    let cfg = PollingConfig::from_json_str(r#"{"leader": {"subject": "reports", "delayed": true}}"#)
        .unwrap();
    assert_eq!(cfg.poller, PollerConfig::default());
    assert_eq!(cfg.leader.subject, "reports");
    assert!(cfg.leader.delayed);
    assert_eq!(
        u128::from(cfg.leader.interval_ms),
        DEFAULT_LEADER_INTERVAL.as_millis()
    );
}

#[test]
fn test_from_json_rejects_invalid() {
    let err = PollingConfig::from_json_str(r#"{"poller": {"interval_ms": 0}}"#).unwrap_err();
    assert!(err.starts_with("poller invalid"));

    let err = PollingConfig::from_json_str("{not json").unwrap_err();
    assert!(err.starts_with("parse error"));
}

#[test]
fn test_from_lookup_overrides_defaults() {
    let cfg = PollingConfig::from_lookup(lookup(&[
        (ENV_POLLER_INTERVAL_MS, "500"),
        (ENV_LEADER_SUBJECT, "billing"),
        (ENV_LEADER_INTERVAL_MS, " 1500 "),
        (ENV_LEADER_DELAYED, "true"),
        (ENV_LEADER_LEASE_TTL_SECS, "900"),
    ]))
    .unwrap();
    assert_eq!(cfg.poller.interval_ms, 500);
    assert_eq!(cfg.leader.subject, "billing");
    assert_eq!(cfg.leader.interval_ms, 1500);
    assert!(cfg.leader.delayed);
    assert_eq!(cfg.leader.lease_ttl_secs, Some(900));
}

#[test]
fn test_from_lookup_reports_bad_values() {
    let err = PollingConfig::from_lookup(lookup(&[(ENV_LEADER_DELAYED, "maybe")])).unwrap_err();
    assert!(err.starts_with(ENV_LEADER_DELAYED));

    let err = PollingConfig::from_lookup(lookup(&[(ENV_LEADER_LEASE_TTL_SECS, "10")])).unwrap_err();
    assert!(err.starts_with("leader invalid"));
}

#[test]
fn test_json_roundtrip_omits_absent_ttl() {
    let json = serde_json::to_string(&LeaderPollerConfig::default()).unwrap();
    assert!(!json.contains("lease_ttl_secs"));
}
