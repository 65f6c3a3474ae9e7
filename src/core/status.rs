use std::sync::atomic::{AtomicBool, Ordering};

/// Process-wide readiness flag.
///
/// Set once the lifecycle coordinator has run its post-construct phase and the
/// listeners are handed to the server. Cleared again when shutdown begins so the
/// status endpoint reports the node as draining.
static READY: AtomicBool = AtomicBool::new(false);

/// Mark the process as ready to serve exported handlers.
pub fn mark_ready() {
    READY.store(true, Ordering::SeqCst);
    log::info!("Lifecycle started, exported handlers are ready");
}

/// Mark the process as shutting down.
pub fn mark_stopping() {
    if READY.swap(false, Ordering::SeqCst) {
        log::info!("Lifecycle stopping, exported handlers are draining");
    }
}

/// Check if the process is ready to handle traffic.
pub fn is_ready() -> bool {
    READY.load(Ordering::SeqCst)
}
