//! End-to-end test utilities for the culvert tunnel listener
//!
//! This crate provides a scripted stand-in for the session-side tunnel
//! client, so the adapter can be exercised without a real multiplexed
//! session or any network I/O.

pub mod fake_client;
pub mod probe;

pub use fake_client::FakeTunnelClient;

/// Initialize tracing for tests
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("culvert=debug,culvert_e2e=debug")
        .with_test_writer()
        .try_init();
}
