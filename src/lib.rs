//! pingport exports request handlers on embedded pingora listeners and runs
//! container-managed lifecycle actions around them.
//!
//! Handlers are grouped into listeners by the port in their URL, see
//! [`exporter::plan`]. Components declare post-construct and pre-destroy
//! methods through [`lifecycle::Managed`] and are started and stopped by a
//! [`lifecycle::LifecycleCoordinator`].

pub mod config;
pub mod core;
pub mod exporter;
pub mod lifecycle;
pub mod logging;
pub mod service;
