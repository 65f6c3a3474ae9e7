use std::{future::Future, sync::Arc};

use async_trait::async_trait;
use log::{error, info};
use pingora::server::{ListenFds, ShutdownWatch};
use pingora::services::Service;
use tokio::signal::unix::{signal, SignalKind};

use crate::core::{status, ErrorContext};

use super::coordinator::{LifecycleCoordinator, PhaseReport};

/// Background service that stops the lifecycle when the process is asked to
/// terminate.
///
/// Pingora flips the shutdown watch on SIGTERM but exits straight away on
/// SIGINT, so the hook listens for both and runs `stop()` once, whichever
/// arrives first.
pub struct ShutdownHook {
    coordinator: Arc<LifecycleCoordinator>,
}

impl ShutdownHook {
    pub fn new(coordinator: Arc<LifecycleCoordinator>) -> Self {
        Self { coordinator }
    }

    /// Wait for shutdown, SIGINT or the watch closing, then stop the lifecycle.
    pub async fn run(&self, shutdown: ShutdownWatch) -> Option<PhaseReport> {
        self.run_until(shutdown, interrupted()).await
    }

    /// Like [`run`](Self::run), with `interrupt` standing in for SIGINT.
    pub async fn run_until<F>(&self, mut shutdown: ShutdownWatch, interrupt: F) -> Option<PhaseReport>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            _ = wait_for_shutdown(&mut shutdown) => {},
            _ = interrupt => info!("Interrupted, stopping lifecycle"),
        }

        status::mark_stopping();

        // Actions may block, keep them off the async workers.
        let coordinator = self.coordinator.clone();
        match tokio::task::spawn_blocking(move || coordinator.stop())
            .await
            .with_context("lifecycle stop task")
        {
            Ok(report) => Some(report),
            Err(e) => {
                error!("{e}");
                None
            }
        }
    }
}

async fn wait_for_shutdown(shutdown: &mut ShutdownWatch) {
    while !*shutdown.borrow() {
        if shutdown.changed().await.is_err() {
            info!("Shutdown watch closed, stopping lifecycle");
            return;
        }
    }
    info!("Shutdown requested, stopping lifecycle");
}

async fn interrupted() {
    match signal(SignalKind::interrupt()) {
        Ok(mut sigint) => {
            sigint.recv().await;
        }
        Err(e) => {
            error!("Failed to install SIGINT handler: {e}");
            std::future::pending::<()>().await;
        }
    }
}

#[async_trait]
impl Service for ShutdownHook {
    async fn start_service(&mut self, _fds: Option<ListenFds>, shutdown: ShutdownWatch) {
        if let Some(report) = self.run(shutdown).await {
            if !report.was_noop() {
                info!(
                    "Shutdown hook ran {} pre-destroy actions",
                    report.executed()
                );
            }
        }
    }

    fn name(&self) -> &str {
        "lifecycle shutdown hook"
    }

    fn threads(&self) -> Option<usize> {
        Some(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::LifecycleRegistry;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::{oneshot, watch};

    fn coordinator_with_counter() -> (Arc<LifecycleCoordinator>, Arc<AtomicUsize>) {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut registry = LifecycleRegistry::new();
        {
            let counter = counter.clone();
            registry.pre_destroy("Listener", "close", move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }
        (Arc::new(registry.build()), counter)
    }

    #[tokio::test]
    async fn test_stops_on_shutdown_signal() {
        let _guard = crate::core::status::tests::TEST_LOCK.lock().unwrap();
        let (coordinator, counter) = coordinator_with_counter();
        coordinator.start();

        let (tx, rx) = watch::channel(false);
        let hook = ShutdownHook::new(coordinator.clone());
        let task = tokio::spawn(async move { hook.run(rx).await });

        tx.send(true).unwrap();
        let report = task.await.unwrap().unwrap();

        assert!(!report.was_noop());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(!coordinator.is_started());
    }

    #[tokio::test]
    async fn test_closed_watch_also_stops() {
        let _guard = crate::core::status::tests::TEST_LOCK.lock().unwrap();
        let (coordinator, counter) = coordinator_with_counter();
        coordinator.start();

        let (tx, rx) = watch::channel(false);
        drop(tx);
        let report = ShutdownHook::new(coordinator.clone()).run(rx).await.unwrap();

        assert_eq!(report.executed(), 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stops_on_interrupt() {
        let _guard = crate::core::status::tests::TEST_LOCK.lock().unwrap();
        let (coordinator, counter) = coordinator_with_counter();
        coordinator.start();

        let (_tx, rx) = watch::channel(false);
        let (interrupt_tx, interrupt_rx) = oneshot::channel::<()>();
        let hook = ShutdownHook::new(coordinator.clone());
        let task = tokio::spawn(async move {
            hook.run_until(rx, async {
                let _ = interrupt_rx.await;
            })
            .await
        });

        interrupt_tx.send(()).unwrap();
        let report = task.await.unwrap().unwrap();

        assert_eq!(report.executed(), 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(!coordinator.is_started());
        assert!(!status::is_ready());
    }

    #[tokio::test]
    async fn test_after_explicit_stop_is_noop() {
        let _guard = crate::core::status::tests::TEST_LOCK.lock().unwrap();
        let (coordinator, counter) = coordinator_with_counter();
        coordinator.start();
        coordinator.stop();

        let (_tx, rx) = watch::channel(true);
        let report = ShutdownHook::new(coordinator).run(rx).await.unwrap();

        assert!(report.was_noop());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
