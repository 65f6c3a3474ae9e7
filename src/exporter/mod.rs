//! Exports request handlers on embedded pingora listeners.
//!
//! The exporter is a managed component: its post-construct `start` plans the
//! listener ports and builds one listening service per port, its pre-destroy
//! `stop` discards whatever was not handed to the server. Listeners already
//! handed over keep serving until the pingora server itself exits.

pub mod dispatch;
pub mod planner;
pub mod source;

use std::{net::SocketAddr, sync::Mutex};

use log::{debug, info, warn};
use pingora::services::listening::Service;

use crate::{
    config,
    core::{ExportError, ExportResult},
    lifecycle::{LifecycleMethod, Managed},
};

pub use dispatch::PathDispatch;
pub use planner::{plan, PortPlan, DEFAULT_PORT};
pub use source::{Handler, ServletSource};

/// Listening service serving one planned port.
pub type ExportedService = Service<PathDispatch>;

#[derive(Default)]
struct ExporterState {
    running: bool,
    ports: Vec<u16>,
    staged: Vec<ExportedService>,
}

/// Binds servlet sources to listeners, one listener per planned port.
pub struct HandlerExporter {
    sources: Vec<ServletSource>,
    config: config::Exporter,
    state: Mutex<ExporterState>,
}

impl HandlerExporter {
    pub fn new(sources: Vec<ServletSource>, config: config::Exporter) -> Self {
        Self {
            sources,
            config,
            state: Mutex::new(ExporterState::default()),
        }
    }

    /// Plan the listener ports and stage one service per port.
    pub fn start(&self) -> ExportResult<()> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.running {
            debug!("Exporter already started");
            return Ok(());
        }

        let plan = plan(self.sources.iter().cloned());
        let mut services = Vec::with_capacity(plan.len());
        for (port, sources) in &plan {
            services.push(self.build_service(*port, sources)?);
        }

        info!(
            "Exporting {} handlers on {} listeners",
            self.sources.len(),
            services.len()
        );

        state.ports = plan.ports().collect();
        state.staged = services;
        state.running = true;
        Ok(())
    }

    /// Drop staged services that were never handed to the server.
    ///
    /// Services already taken with [`take_services`](Self::take_services)
    /// belong to the pingora server and stay bound until it exits.
    pub fn stop(&self) -> ExportResult<()> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if !state.running {
            debug!("Exporter already stopped");
            return Ok(());
        }

        if !state.staged.is_empty() {
            info!("Discarding {} unclaimed listeners", state.staged.len());
        }
        info!("Exporter stopped, ports {:?} no longer managed", state.ports);
        *state = ExporterState::default();
        Ok(())
    }

    /// Hand the staged listeners over, leaving none behind.
    pub fn take_services(&self) -> Vec<ExportedService> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut state.staged)
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).running
    }

    /// Ports planned by the last `start()`.
    pub fn ports(&self) -> Vec<u16> {
        self.state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .ports
            .clone()
    }

    fn build_service(&self, port: u16, sources: &[ServletSource]) -> ExportResult<ExportedService> {
        let mut dispatch = PathDispatch::new(port);
        for source in sources {
            dispatch.mount(source);
        }

        let mut service = Service::new(format!("Exporter HTTP {port}"), dispatch);
        let addr = SocketAddr::new(self.config.bind, port);
        service.add_tcp(&addr.to_string());
        debug!("Listener {addr} planned with {} handlers", sources.len());

        if let Some(tls) = &self.config.tls {
            match port.checked_add(1) {
                Some(tls_port) => {
                    let tls_addr = SocketAddr::new(self.config.bind, tls_port);
                    service
                        .add_tls(&tls_addr.to_string(), &tls.cert_path, &tls.key_path)
                        .map_err(|e| ExportError::Tls(format!("listener {tls_addr}: {e}")))?;
                    debug!("TLS listener {tls_addr} planned");
                }
                None => warn!("No TLS listener for port {port}, port + 1 is out of range"),
            }
        }

        Ok(service)
    }
}

impl Managed for HandlerExporter {
    fn lifecycle_methods() -> Vec<LifecycleMethod<Self>> {
        vec![
            LifecycleMethod::post_construct("start", |exporter: &Self| Ok(exporter.start()?)),
            LifecycleMethod::pre_destroy("stop", |exporter: &Self| Ok(exporter.stop()?)),
        ]
    }

    fn describe(&self) -> String {
        format!("HandlerExporter({} handlers)", self.sources.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{exporter::source::tests::source, lifecycle::LifecycleRegistry};
    use pingora::services::Service as _;
    use std::sync::Arc;

    fn exporter(urls: &[&str]) -> HandlerExporter {
        let sources = urls.iter().map(|url| source(url)).collect();
        HandlerExporter::new(sources, config::Exporter::default())
    }

    #[test]
    fn test_start_stages_one_service_per_port() {
        let exporter = exporter(&[
            "http://localhost:8080/api",
            "http://localhost:9090/admin",
            "http://localhost/status",
        ]);

        exporter.start().unwrap();
        assert!(exporter.is_running());
        assert_eq!(exporter.ports(), vec![8080, 9090]);

        let services = exporter.take_services();
        assert_eq!(services.len(), 2);
        assert!(exporter.take_services().is_empty());
    }

    #[test]
    fn test_start_twice_keeps_first_plan() {
        let exporter = exporter(&["http://localhost/status"]);

        exporter.start().unwrap();
        exporter.start().unwrap();
        assert_eq!(exporter.ports(), vec![DEFAULT_PORT]);
        assert_eq!(exporter.take_services().len(), 1);
    }

    #[test]
    fn test_stop_discards_unclaimed_services() {
        let exporter = exporter(&["http://localhost:8080/api"]);

        exporter.start().unwrap();
        exporter.stop().unwrap();
        assert!(!exporter.is_running());
        assert!(exporter.ports().is_empty());
        assert!(exporter.take_services().is_empty());

        exporter.start().unwrap();
        assert_eq!(exporter.take_services().len(), 1);
    }

    #[test]
    fn test_stop_leaves_handed_over_services_alone() {
        let exporter = exporter(&["http://localhost:8080/api", "http://localhost:9090/admin"]);

        exporter.start().unwrap();
        let services = exporter.take_services();
        exporter.stop().unwrap();

        assert!(!exporter.is_running());
        assert_eq!(services.len(), 2);
        let names: Vec<_> = services.iter().map(|service| service.name()).collect();
        assert_eq!(names, vec!["Exporter HTTP 8080", "Exporter HTTP 9090"]);
    }

    #[test]
    fn test_no_sources_no_listeners() {
        let exporter = exporter(&[]);
        exporter.start().unwrap();
        assert!(exporter.ports().is_empty());
    }

    #[test]
    fn test_missing_tls_material_is_contained_by_lifecycle() {
        let config = config::Exporter {
            tls: Some(config::Tls {
                cert_path: "/nonexistent/server.crt".to_string(),
                key_path: "/nonexistent/server.key".to_string(),
            }),
            ..Default::default()
        };
        let exporter = Arc::new(HandlerExporter::new(
            vec![source("http://localhost:8443/secure")],
            config,
        ));

        let mut registry = LifecycleRegistry::new();
        registry.manage(&exporter);
        let coordinator = registry.build();

        let report = coordinator.start();
        assert!(coordinator.is_started());
        let failures: Vec<_> = report.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].method, "start");
        assert!(failures[0].error().unwrap().starts_with("SSL/TLS error"));
        assert!(!exporter.is_running());
    }

    #[test]
    fn test_managed_start_and_stop() {
        let exporter = Arc::new(exporter(&["http://localhost:8080/api"]));
        let mut registry = LifecycleRegistry::new();
        registry.manage(&exporter);
        let coordinator = registry.build();

        assert!(coordinator.start().is_clean());
        assert!(exporter.is_running());
        assert!(coordinator.stop().is_clean());
        assert!(!exporter.is_running());
    }
}
