use std::sync::Arc;

use pingora::services::listening::Service;
use pingora_core::server::{configuration::Opt, Server};
use sentry::IntoDsn;

use pingport::{
    config::{Config, Sentry},
    core::{status, ServiceContainer},
    exporter::HandlerExporter,
    lifecycle::ShutdownHook,
    logging,
    service::build_sources,
};

fn main() {
    // Read command-line arguments
    let opt = Opt::parse_args();

    // Load configuration with optional override
    let config = match Config::load_yaml_with_opt_override(&opt) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            std::process::exit(1);
        }
    };

    // Initialize logging
    let log_sink = logging::init(config.log.as_ref());

    // Build handlers from configured endpoints
    log::info!("Loading endpoints...");
    let sources = match build_sources(&config.endpoints) {
        Ok(sources) => sources,
        Err(e) => {
            eprintln!("Failed to load endpoints: {e}");
            std::process::exit(1);
        }
    };

    // Wire managed components
    let container = ServiceContainer::new();
    container.provide(Arc::new(HandlerExporter::new(
        sources,
        config.exporter.clone(),
    )));
    let lifecycle = Arc::new(container.take_lifecycle());

    log::info!("Starting lifecycle...");
    let report = lifecycle.start();
    if !report.is_clean() {
        log::warn!(
            "{} post-construct actions failed, continuing",
            report.failures().count()
        );
    }

    let mut pingport_server = Server::new_with_opt_and_conf(Some(opt), config.pingora);

    if let Some(sentry_cfg) = &config.sentry {
        add_sentry(&mut pingport_server, sentry_cfg);
    }

    if let Some(log_service) = log_sink {
        log::info!("Adding log sync service...");
        pingport_server.add_service(log_service);
    }

    log::info!("Bootstrapping...");
    pingport_server.bootstrap();

    log::info!("Bootstrapped. Adding exported listeners...");
    if let Some(exporter) = container.get::<HandlerExporter>() {
        for service in exporter.take_services() {
            pingport_server.add_service(service);
        }
    }

    if let Some(prometheus_cfg) = &config.prometheus {
        log::info!("Adding Prometheus HTTP...");
        let mut prometheus_service_http = Service::prometheus_http_service();
        prometheus_service_http.add_tcp(&prometheus_cfg.address.to_string());
        pingport_server.add_service(prometheus_service_http);
    }

    pingport_server.add_service(ShutdownHook::new(lifecycle));

    status::mark_ready();
    log::info!("Starting Server...");
    pingport_server.run_forever();
}

fn add_sentry(server: &mut Server, sentry_cfg: &Sentry) {
    log::info!("Adding Sentry config...");
    let dsn = match sentry_cfg.dsn.clone().into_dsn() {
        Ok(Some(dsn)) => dsn,
        Ok(None) => {
            log::warn!("Sentry DSN is empty or invalid, Sentry disabled.");
            return;
        }
        Err(e) => {
            log::error!("Error parsing Sentry DSN: {e}");
            return;
        }
    };
    server.sentry = Some(sentry::ClientOptions {
        dsn: Some(dsn),
        ..Default::default()
    });
}
