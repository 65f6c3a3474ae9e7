//! Prometheus counters shared by the exporter and the lifecycle coordinator.

use once_cell::sync::Lazy;
use prometheus::{register_int_counter_vec, IntCounterVec};

// Lifecycle actions executed, by phase and outcome
pub static LIFECYCLE_ACTIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "lifecycle_actions_total",
        "Lifecycle actions executed since pingport started",
        &["phase", "outcome"]
    )
    .expect("lifecycle_actions_total registers once")
});

// Requests handed to a mounted handler, by listener port
pub static DISPATCHED_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "exporter_requests_total",
        "Requests dispatched to exported handlers per listener port",
        &["port", "matched"]
    )
    .expect("exporter_requests_total registers once")
});
