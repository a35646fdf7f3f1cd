//! Tests for error types

use prometheus_poller::core::{PollerError, StoreError};

#[test]
fn test_poller_error_display() {
    assert_eq!(PollerError::MissingStore.to_string(), "missing key-value store");
    assert_eq!(
        PollerError::InvalidConfig("interval must be greater than 0".into()).to_string(),
        "invalid configuration: interval must be greater than 0"
    );
}

#[test]
fn test_store_error_converts() {
    let err: PollerError = StoreError::Backend("READONLY".into()).into();
    assert_eq!(err.to_string(), "store error: backend error: READONLY");
    assert!(matches!(err, PollerError::Store(StoreError::Backend(_))));

    let err = StoreError::Connection("refused".into());
    assert_eq!(err.clone().to_string(), "connection failed: refused");
}

#[test]
fn test_store_error_into_anyhow() {
    let err: anyhow::Error = StoreError::Connection("timeout".into()).into();
    assert!(err.downcast_ref::<StoreError>().is_some());
}
