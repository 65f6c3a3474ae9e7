//! Tests for the core module
//!
//! Exercises the container together with the lifecycle coordinator and the
//! exporter it wires up.

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use crate::{
        config,
        core::{container::ServiceContainer, error::ExportError},
        exporter::{HandlerExporter, ServletSource},
        lifecycle::{ActionResult, LifecycleMethod, Managed, Phase},
        service::StatusHttpApp,
    };

    type Journal = Arc<Mutex<Vec<String>>>;

    struct Database {
        journal: Journal,
    }

    impl Database {
        fn note(&self, event: &str) -> ActionResult {
            self.journal.lock().unwrap().push(event.to_string());
            Ok(())
        }
    }

    impl Managed for Database {
        fn lifecycle_methods() -> Vec<LifecycleMethod<Self>> {
            vec![
                LifecycleMethod::post_construct("connect", |db: &Self| db.note("db.connect")),
                LifecycleMethod::pre_destroy("disconnect", |db: &Self| db.note("db.disconnect")),
            ]
        }
    }

    struct Cache {
        journal: Journal,
    }

    impl Managed for Cache {
        fn lifecycle_methods() -> Vec<LifecycleMethod<Self>> {
            vec![
                LifecycleMethod::post_construct("warm", |cache: &Self| {
                    cache.journal.lock().unwrap().push("cache.warm".to_string());
                    Err(ExportError::Internal("cache backend offline".to_string()).into())
                }),
                LifecycleMethod::pre_destroy("flush", |cache: &Self| {
                    cache.journal.lock().unwrap().push("cache.flush".to_string());
                    Ok(())
                }),
            ]
        }
    }

    /// Test component lookup by type
    #[test]
    fn test_container_lookup() {
        let container = ServiceContainer::new();
        let journal = Journal::default();
        assert!(container.get::<Database>().is_none());

        let db = Arc::new(Database {
            journal: journal.clone(),
        });
        container.provide(db.clone());

        assert!(container.contains::<Database>());
        assert!(Arc::ptr_eq(&container.get::<Database>().unwrap(), &db));
        assert!(container.get::<Cache>().is_none());
    }

    /// Test lifecycle ordering across components
    #[test]
    fn test_container_lifecycle_order() {
        let container = ServiceContainer::new();
        let journal = Journal::default();

        container
            .provide(Arc::new(Database {
                journal: journal.clone(),
            }))
            .provide(Arc::new(Cache {
                journal: journal.clone(),
            }));

        let lifecycle = container.take_lifecycle();
        let started = lifecycle.start();
        let stopped = lifecycle.stop();

        assert_eq!(
            *journal.lock().unwrap(),
            vec!["db.connect", "cache.warm", "cache.flush", "db.disconnect"]
        );

        let failures: Vec<_> = started.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].method, "warm");
        assert_eq!(
            failures[0].error(),
            Some("Internal error: cache backend offline")
        );
        assert!(stopped.is_clean());
    }

    /// Test free-standing callbacks registered through the container
    #[test]
    fn test_container_free_callbacks() {
        let container = ServiceContainer::new();
        let registration =
            container.with_lifecycle(|registry| registry.pre_destroy("Banner", "bye", || Ok(())));

        let lifecycle = container.take_lifecycle();
        assert_eq!(lifecycle.pre_destroy_actions().len(), 1);
        assert!(container.take_lifecycle().pre_destroy_actions().is_empty());

        lifecycle.start();
        lifecycle.stop();
        assert_eq!(
            registration.last_outcome().map(|o| o.phase),
            Some(Phase::PreDestroy)
        );
    }

    /// Integration test for exporter wiring through the container
    #[test]
    fn test_exporter_through_container() {
        let container = ServiceContainer::new();
        let sources = vec![
            ServletSource::parse("http://localhost:8080/api", Arc::new(StatusHttpApp)).unwrap(),
            ServletSource::parse("http://localhost:9090/admin", Arc::new(StatusHttpApp)).unwrap(),
            ServletSource::parse("http://localhost/status", Arc::new(StatusHttpApp)).unwrap(),
        ];
        container.provide(Arc::new(HandlerExporter::new(
            sources,
            config::Exporter::default(),
        )));

        let lifecycle = container.take_lifecycle();
        assert!(lifecycle.start().is_clean());

        let exporter = container.get::<HandlerExporter>().unwrap();
        assert_eq!(exporter.ports(), vec![8080, 9090]);
        assert_eq!(exporter.take_services().len(), 2);

        assert!(lifecycle.stop().is_clean());
        assert!(!exporter.is_running());
    }
}
