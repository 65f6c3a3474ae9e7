//! Dependency injection container
//!
//! Holds the application's managed components and feeds each one to the
//! lifecycle registry as it is provided, so registration order follows the
//! order components are wired.

use std::{
    any::{Any, TypeId},
    sync::{Arc, Mutex},
};

use dashmap::DashMap;
use log::debug;

use crate::lifecycle::{LifecycleCoordinator, LifecycleRegistry, Managed};

/// Main dependency injection container
#[derive(Default)]
pub struct ServiceContainer {
    components: DashMap<TypeId, Arc<dyn Any + Send + Sync>>,
    lifecycle: Mutex<LifecycleRegistry>,
}

impl ServiceContainer {
    /// Create an empty container
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a component and register its lifecycle methods.
    ///
    /// A later component of the same type replaces the earlier one for
    /// lookups; both keep their lifecycle registrations.
    pub fn provide<T: Managed>(&self, component: Arc<T>) -> &Self {
        self.registry().manage(&component);
        if self
            .components
            .insert(TypeId::of::<T>(), component)
            .is_some()
        {
            debug!("Replaced component {}", std::any::type_name::<T>());
        }
        self
    }

    /// Look up a component by type
    pub fn get<T: Managed>(&self) -> Option<Arc<T>> {
        self.components
            .get(&TypeId::of::<T>())
            .and_then(|entry| entry.value().clone().downcast::<T>().ok())
    }

    pub fn contains<T: Managed>(&self) -> bool {
        self.components.contains_key(&TypeId::of::<T>())
    }

    /// Access the registry for free-standing lifecycle callbacks
    pub fn with_lifecycle<R>(&self, f: impl FnOnce(&mut LifecycleRegistry) -> R) -> R {
        let mut registry = self.registry();
        f(&mut *registry)
    }

    /// Build a coordinator from everything registered so far.
    ///
    /// Components provided afterwards start a fresh registry.
    pub fn take_lifecycle(&self) -> LifecycleCoordinator {
        std::mem::take(&mut *self.registry()).build()
    }

    fn registry(&self) -> std::sync::MutexGuard<'_, LifecycleRegistry> {
        self.lifecycle.lock().unwrap_or_else(|e| e.into_inner())
    }
}
