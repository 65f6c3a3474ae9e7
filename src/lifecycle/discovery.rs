//! Explicit lifecycle registration feed.
//!
//! Components declare their post-construct and pre-destroy methods through
//! [`Managed`]; the [`LifecycleRegistry`] binds them to the component instance
//! in the order components are handed over.

use std::{any::Any, collections::HashMap, sync::Arc};

use log::debug;

use super::{
    coordinator::LifecycleCoordinator,
    registration::{ActionResult, Phase, Registration},
};

/// A lifecycle method declared by a component type.
pub struct LifecycleMethod<T: ?Sized> {
    phase: Phase,
    name: &'static str,
    call: fn(&T) -> ActionResult,
}

impl<T: ?Sized> LifecycleMethod<T> {
    pub const fn post_construct(name: &'static str, call: fn(&T) -> ActionResult) -> Self {
        Self {
            phase: Phase::PostConstruct,
            name,
            call,
        }
    }

    pub const fn pre_destroy(name: &'static str, call: fn(&T) -> ActionResult) -> Self {
        Self {
            phase: Phase::PreDestroy,
            name,
            call,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// A container-managed component with lifecycle methods.
///
/// A component that builds on another managed type lists the inner type's
/// methods before its own, e.g. by mapping `Inner::lifecycle_methods()` through
/// an accessor.
pub trait Managed: Send + Sync + 'static {
    fn lifecycle_methods() -> Vec<LifecycleMethod<Self>>
    where
        Self: Sized;

    /// Identity used in lifecycle logs.
    fn describe(&self) -> String {
        std::any::type_name::<Self>().to_string()
    }
}

/// Collects registrations for both lifecycle phases.
#[derive(Default)]
pub struct LifecycleRegistry {
    post_construct: Vec<Arc<Registration>>,
    pre_destroy: Vec<Arc<Registration>>,
    // Keeps visited components alive so their addresses stay unique.
    seen: HashMap<usize, Arc<dyn Any + Send + Sync>>,
}

impl LifecycleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every lifecycle method of `component`.
    ///
    /// Returns `false` if this exact instance was already managed.
    pub fn manage<T: Managed>(&mut self, component: &Arc<T>) -> bool {
        let key = Arc::as_ptr(component) as *const () as usize;
        if self.seen.contains_key(&key) {
            debug!("{} already managed", component.describe());
            return false;
        }
        self.seen
            .insert(key, component.clone() as Arc<dyn Any + Send + Sync>);

        let target = component.describe();
        for method in T::lifecycle_methods() {
            let instance = component.clone();
            let call = method.call;
            let registration = Registration::new(target.clone(), method.name, move || {
                call(instance.as_ref())
            });
            self.register(method.phase, Arc::new(registration));
        }
        true
    }

    /// Register a free-standing post-construct callback.
    pub fn post_construct<F>(
        &mut self,
        target: impl Into<String>,
        method: impl Into<String>,
        action: F,
    ) -> Arc<Registration>
    where
        F: Fn() -> ActionResult + Send + Sync + 'static,
    {
        let registration = Arc::new(Registration::new(target, method, action));
        self.register(Phase::PostConstruct, registration.clone());
        registration
    }

    /// Register a free-standing pre-destroy callback.
    pub fn pre_destroy<F>(
        &mut self,
        target: impl Into<String>,
        method: impl Into<String>,
        action: F,
    ) -> Arc<Registration>
    where
        F: Fn() -> ActionResult + Send + Sync + 'static,
    {
        let registration = Arc::new(Registration::new(target, method, action));
        self.register(Phase::PreDestroy, registration.clone());
        registration
    }

    /// Append an existing, possibly shared, registration to a phase.
    pub fn register(&mut self, phase: Phase, registration: Arc<Registration>) {
        debug!("Registering {phase} {registration}");
        match phase {
            Phase::PostConstruct => self.post_construct.push(registration),
            Phase::PreDestroy => self.pre_destroy.push(registration),
        }
    }

    pub fn len(&self, phase: Phase) -> usize {
        match phase {
            Phase::PostConstruct => self.post_construct.len(),
            Phase::PreDestroy => self.pre_destroy.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.post_construct.is_empty() && self.pre_destroy.is_empty()
    }

    pub fn build(self) -> LifecycleCoordinator {
        LifecycleCoordinator::new(self.post_construct, self.pre_destroy)
    }
}
