//! Shared application state.
//!
//! Wires the store, event bus, process backend and side-effect
//! dispatcher into the services and coordinators. Collaborators are
//! injected explicitly so the same wiring serves PostgreSQL + NATS in
//! production and the in-memory store + local backend in tests and the
//! CLI runtime.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::DefinitionCache;
use crate::config::{AppConfig, DatabaseConfig};
use crate::dispatch::{DefaultDispatcher, RecordingDispatcher, SideEffectDispatcher};
use crate::engine::{ExecutionCoordinator, LocalProcessBackend, ProcessBackend, StepTracker};
use crate::error::{AppError, AppResult};
use crate::events::{EventBus, NatsPublisher};
use crate::rules::RuleCoordinator;
use crate::services::{DefinitionService, ExecutionService, RuleService, StatsService};
use crate::storage::{create_pool, MemoryStore, PostgresStore, Store};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<AppConfig>,

    /// Persistent store
    pub store: Arc<dyn Store>,

    /// Lifecycle event bus
    pub events: EventBus,

    /// Definition lifecycle operations
    pub definitions: Arc<DefinitionService>,

    /// Execution queries
    pub executions: Arc<ExecutionService>,

    /// Rule CRUD
    pub rules: Arc<RuleService>,

    /// Dashboard aggregates
    pub stats: Arc<StatsService>,

    /// Execution lifecycle commands
    pub coordinator: Arc<ExecutionCoordinator>,

    /// Step lifecycle recording (backend callback target)
    pub tracker: Arc<StepTracker>,

    /// Rule firing
    pub rule_engine: Arc<RuleCoordinator>,
}

impl AppState {
    /// Wire the application state from its collaborators.
    pub fn new(
        config: AppConfig,
        store: Arc<dyn Store>,
        events: EventBus,
        tracker: Arc<StepTracker>,
        backend: Arc<dyn ProcessBackend>,
        dispatcher: Arc<dyn SideEffectDispatcher>,
    ) -> Self {
        let cache = Arc::new(DefinitionCache::new(Duration::from_secs(
            config.definition_cache_ttl,
        )));

        let coordinator = Arc::new(ExecutionCoordinator::new(
            store.clone(),
            events.clone(),
            backend,
        ));
        let rule_engine = Arc::new(RuleCoordinator::new(
            store.clone(),
            events.clone(),
            dispatcher,
        ));

        Self {
            config: Arc::new(config),
            definitions: Arc::new(DefinitionService::new(store.clone(), cache)),
            executions: Arc::new(ExecutionService::new(store.clone())),
            rules: Arc::new(RuleService::new(store.clone())),
            stats: Arc::new(StatsService::new(store.clone())),
            coordinator,
            tracker,
            rule_engine,
            store,
            events,
        }
    }

    /// Production wiring: PostgreSQL store, NATS lifecycle events and
    /// side-effect dispatch. The process backend is supplied by the
    /// caller once the step tracker exists, since backends deliver their
    /// step callbacks through it.
    pub async fn connect<F>(
        config: AppConfig,
        database: &DatabaseConfig,
        backend: F,
    ) -> AppResult<Self>
    where
        F: FnOnce(Arc<StepTracker>) -> Arc<dyn ProcessBackend>,
    {
        let pool = create_pool(database).await?;
        let store: Arc<dyn Store> = Arc::new(PostgresStore::new(pool));

        let Some(nats_url) = config.nats_url.clone() else {
            return Err(AppError::Config(
                "FLOWPLANE_NATS_URL is required for connected mode".to_string(),
            ));
        };
        let client = async_nats::connect(&nats_url)
            .await
            .map_err(|e| AppError::Nats(e.to_string()))?;
        let publisher = NatsPublisher::new(Arc::new(client), Some(&config.event_stream))
            .await
            .map_err(|e| AppError::Nats(e.to_string()))?;

        let events = EventBus::new(publisher.clone());
        let dispatcher: Arc<dyn SideEffectDispatcher> =
            Arc::new(DefaultDispatcher::new(publisher));
        let tracker = Arc::new(StepTracker::new(store.clone(), events.clone()));
        let backend = backend(tracker.clone());

        Ok(Self::new(config, store, events, tracker, backend, dispatcher))
    }

    /// Self-contained state over the in-memory store and local backend:
    /// no PostgreSQL, no NATS, recorded side effects.
    pub fn local(config: AppConfig) -> Self {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let events = EventBus::disabled();
        let tracker = Arc::new(StepTracker::new(store.clone(), events.clone()));
        let backend: Arc<dyn ProcessBackend> =
            Arc::new(LocalProcessBackend::new(store.clone(), tracker.clone()));
        let dispatcher: Arc<dyn SideEffectDispatcher> = Arc::new(RecordingDispatcher::new());

        Self::new(config, store, events, tracker, backend, dispatcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_local_state_wires_all_services() {
        let state = AppState::local(AppConfig::default());
        assert!(!state.events.is_enabled());

        let tenant = uuid::Uuid::new_v4();
        let stats = state.stats.dashboard(tenant).await.unwrap();
        assert!(stats.executions_by_status.is_empty());
    }
}
