use std::{
    any::Any,
    fmt,
    io::Write,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex,
    },
};

use log::{debug, warn, Level};

use crate::core::metrics::LIFECYCLE_ACTIONS;

/// Error returned by a lifecycle action.
pub type ActionError = Box<dyn std::error::Error + Send + Sync>;

/// Result of a single lifecycle action.
pub type ActionResult = Result<(), ActionError>;

/// Lifecycle phase a registration belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Runs on `start()`, in registration order.
    PostConstruct,
    /// Runs on `stop()`, in reverse registration order.
    PreDestroy,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::PostConstruct => "post_construct",
            Phase::PreDestroy => "pre_destroy",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Recorded result of executing one registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutcome {
    pub phase: Phase,
    pub target: String,
    pub method: String,
    pub result: Result<(), String>,
}

impl ActionOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }

    pub fn error(&self) -> Option<&str> {
        self.result.as_ref().err().map(String::as_str)
    }
}

/// A lifecycle callback bound to its owning component.
///
/// The has-run flag makes execution once-only per activation even when the
/// same registration is shared by several coordinators.
pub struct Registration {
    target: String,
    method: String,
    action: Box<dyn Fn() -> ActionResult + Send + Sync>,
    has_run: AtomicBool,
    last_outcome: Mutex<Option<ActionOutcome>>,
}

impl Registration {
    pub fn new<F>(target: impl Into<String>, method: impl Into<String>, action: F) -> Self
    where
        F: Fn() -> ActionResult + Send + Sync + 'static,
    {
        Self {
            target: target.into(),
            method: method.into(),
            action: Box::new(action),
            has_run: AtomicBool::new(false),
            last_outcome: Mutex::new(None),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn has_run(&self) -> bool {
        self.has_run.load(Ordering::Acquire)
    }

    /// Clear the has-run flag so the next activation executes the action again.
    pub fn reset(&self) {
        self.has_run.store(false, Ordering::Release);
    }

    /// Outcome of the most recent execution, if any.
    pub fn last_outcome(&self) -> Option<ActionOutcome> {
        self.last_outcome
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Run the action once for this activation.
    ///
    /// Returns `None` when the action already ran. Failures and panics are
    /// captured in the returned outcome and never propagated; the flag stays
    /// set so a failed action is not retried until the next reset.
    pub fn execute(&self, phase: Phase) -> Option<ActionOutcome> {
        if self.has_run.swap(true, Ordering::AcqRel) {
            debug!("Skipping {phase} {self}, already ran");
            return None;
        }

        let result = match catch_unwind(AssertUnwindSafe(|| (self.action)())) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => Err(err.to_string()),
            Err(panic) => Err(format!("panicked: {}", panic_message(panic.as_ref()))),
        };

        let outcome = ActionOutcome {
            phase,
            target: self.target.clone(),
            method: self.method.clone(),
            result,
        };

        let label = if outcome.is_ok() { "ok" } else { "error" };
        LIFECYCLE_ACTIONS
            .with_label_values(&[phase.as_str(), label])
            .inc();

        if let Some(err) = outcome.error() {
            report_failure(self, err);
        }

        *self.last_outcome.lock().unwrap_or_else(|e| e.into_inner()) = Some(outcome.clone());
        Some(outcome)
    }
}

impl fmt::Display for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}", self.target, self.method)
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("target", &self.target)
            .field("method", &self.method)
            .field("has_run", &self.has_run())
            .finish()
    }
}

fn report_failure(registration: &Registration, err: &str) {
    report_failure_to(
        registration,
        err,
        log::log_enabled!(Level::Warn),
        &mut std::io::stderr(),
    );
}

// Writes to `fallback` when no logger would accept the warning.
fn report_failure_to(registration: &Registration, err: &str, logged: bool, fallback: &mut impl Write) {
    if logged {
        warn!(
            "error invoking method {} on target {}: {}",
            registration.method, registration.target, err
        );
    } else {
        let _ = writeln!(
            fallback,
            "error invoking method {} on target {}: {}",
            registration.method, registration.target, err
        );
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
