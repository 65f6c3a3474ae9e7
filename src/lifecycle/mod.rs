//! Component lifecycle management
//!
//! Post-construct actions run in registration order on `start()`; pre-destroy
//! actions run in reverse registration order on `stop()`. Each action runs at
//! most once per activation and its failure never escapes the phase.

pub mod coordinator;
pub mod discovery;
pub mod hook;
pub mod registration;

pub use coordinator::{LifecycleCoordinator, PhaseReport};
pub use discovery::{LifecycleMethod, LifecycleRegistry, Managed};
pub use hook::ShutdownHook;
pub use registration::{ActionError, ActionOutcome, ActionResult, Phase, Registration};
