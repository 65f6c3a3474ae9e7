//! Built-in handlers that can be exported from configuration.

pub mod builtin;
pub mod status;

pub use builtin::{build_handler, build_sources, EchoHttpApp, StaticHttpApp};
pub use status::StatusHttpApp;
