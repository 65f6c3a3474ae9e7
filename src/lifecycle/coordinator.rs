use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use log::{debug, info};

use super::registration::{ActionOutcome, Phase, Registration};

/// What one `start()` or `stop()` call did.
#[derive(Debug, Clone)]
pub struct PhaseReport {
    phase: Phase,
    transitioned: bool,
    outcomes: Vec<ActionOutcome>,
}

impl PhaseReport {
    fn noop(phase: Phase) -> Self {
        Self {
            phase,
            transitioned: false,
            outcomes: Vec::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// True when the call found the coordinator already in the target state.
    pub fn was_noop(&self) -> bool {
        !self.transitioned
    }

    /// Outcomes in execution order.
    pub fn outcomes(&self) -> &[ActionOutcome] {
        &self.outcomes
    }

    pub fn executed(&self) -> usize {
        self.outcomes.len()
    }

    pub fn failures(&self) -> impl Iterator<Item = &ActionOutcome> {
        self.outcomes.iter().filter(|o| !o.is_ok())
    }

    pub fn is_clean(&self) -> bool {
        self.failures().next().is_none()
    }
}

/// Runs post-construct and pre-destroy actions at container start and stop.
///
/// `start()` and `stop()` are idempotent and safe to race from several
/// threads: the state flip is a single compare-exchange and every action is
/// guarded by its own has-run flag. No lock is held while actions run, so an
/// action calling back into its coordinator sees a no-op.
pub struct LifecycleCoordinator {
    started: AtomicBool,
    post_construct: Vec<Arc<Registration>>,
    pre_destroy: Vec<Arc<Registration>>,
}

impl LifecycleCoordinator {
    pub fn new(post_construct: Vec<Arc<Registration>>, pre_destroy: Vec<Arc<Registration>>) -> Self {
        Self {
            started: AtomicBool::new(false),
            post_construct,
            pre_destroy,
        }
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    pub fn post_construct_actions(&self) -> &[Arc<Registration>] {
        &self.post_construct
    }

    pub fn pre_destroy_actions(&self) -> &[Arc<Registration>] {
        &self.pre_destroy
    }

    /// Run every post-construct action once, in registration order.
    pub fn start(&self) -> PhaseReport {
        if self
            .started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Lifecycle already started");
            return PhaseReport::noop(Phase::PostConstruct);
        }

        info!(
            "Starting lifecycle, {} post-construct actions",
            self.post_construct.len()
        );

        let outcomes: Vec<_> = self
            .post_construct
            .iter()
            .filter_map(|registration| registration.execute(Phase::PostConstruct))
            .collect();

        // Makes the following stop() run them even if they ran before.
        for registration in &self.pre_destroy {
            registration.reset();
        }

        Self::finish(Phase::PostConstruct, outcomes)
    }

    /// Run every pre-destroy action once, last registered first.
    pub fn stop(&self) -> PhaseReport {
        if self
            .started
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Lifecycle already stopped");
            return PhaseReport::noop(Phase::PreDestroy);
        }

        info!(
            "Stopping lifecycle, {} pre-destroy actions",
            self.pre_destroy.len()
        );

        let outcomes: Vec<_> = self
            .pre_destroy
            .iter()
            .rev()
            .filter_map(|registration| registration.execute(Phase::PreDestroy))
            .collect();

        for registration in &self.post_construct {
            registration.reset();
        }

        Self::finish(Phase::PreDestroy, outcomes)
    }

    fn finish(phase: Phase, outcomes: Vec<ActionOutcome>) -> PhaseReport {
        let report = PhaseReport {
            phase,
            transitioned: true,
            outcomes,
        };
        let failed = report.failures().count();
        if failed > 0 {
            info!(
                "Lifecycle {phase} finished, {} actions run, {failed} failed",
                report.executed()
            );
        } else {
            info!("Lifecycle {phase} finished, {} actions run", report.executed());
        }
        report
    }
}
