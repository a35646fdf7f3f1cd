//! Tests for utility helpers

use prometheus_poller::core::new_lease_token;
use prometheus_poller::util::{init_tracing, init_tracing_with, now_ms, now_nanos};

#[test]
fn test_lease_token_starts_with_timestamp() {
    let before = now_nanos();
    let token = new_lease_token();
    let (stamp, suffix) = token.split_once('-').expect("token separator");
    let stamp: u128 = stamp.parse().expect("numeric timestamp");
    assert!(stamp >= before);
    assert_eq!(suffix.len(), 8);
    assert!(now_ms() > 0);
}

#[test]
fn test_init_tracing_is_repeatable() {
    init_tracing_with("debug");
    init_tracing();
    tracing::info!("tracing initialized twice without panicking");
}
