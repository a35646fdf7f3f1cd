//! Tests for builders

use std::time::Duration;

use prometheus_poller::builders::build_poller;
use prometheus_poller::config::PollerConfig;
use prometheus_poller::core::{AppResult, PollerError};

#[tokio::test]
async fn test_build_poller_applies_interval() {
    let cfg = PollerConfig { interval_ms: 250 };
    let poller = build_poller(&cfg, |n: &mut u32| -> AppResult<()> {
        *n += 1;
        Ok(())
    })
    .expect("poller");
    assert_eq!(poller.settings().interval, Duration::from_millis(250));
    poller.stop();
}

#[tokio::test]
async fn test_build_poller_rejects_zero_interval() {
    let cfg = PollerConfig { interval_ms: 0 };
    let result = build_poller(&cfg, |_: &mut u32| -> AppResult<()> { Ok(()) });
    assert!(matches!(result, Err(PollerError::InvalidConfig(_))));
}
