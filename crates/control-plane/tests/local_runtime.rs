//! End-to-end scenarios over the in-memory store and local backend.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use flowplane_control_plane::config::AppConfig;
use flowplane_control_plane::definition::graph::{
    Connection, StepDef, StepType, WorkflowGraph,
};
use flowplane_control_plane::engine::{BackendHandle, ProcessBackend};
use flowplane_control_plane::model::{ExecutionStatus, StepStatus, WorkflowDefinition};
use flowplane_control_plane::services::definition::CreateDefinitionRequest;
use flowplane_control_plane::state::AppState;
use flowplane_control_plane::AppResult;

fn event(id: &str, kind: &str) -> StepDef {
    StepDef {
        id: id.to_string(),
        name: id.to_string(),
        step_type: StepType::Event,
        config: HashMap::from([("event_kind".to_string(), serde_json::json!(kind))]),
    }
}

fn service_step(id: &str, config: serde_json::Value) -> StepDef {
    let config = match config {
        serde_json::Value::Object(map) => map.into_iter().collect(),
        _ => HashMap::new(),
    };
    StepDef {
        id: id.to_string(),
        name: format!("Step {}", id),
        step_type: StepType::Service,
        config,
    }
}

fn chain(ids: &[&str]) -> Vec<Connection> {
    ids.windows(2)
        .map(|pair| Connection {
            from: pair[0].to_string(),
            to: pair[1].to_string(),
            condition: None,
        })
        .collect()
}

async fn register(
    state: &AppState,
    tenant: Uuid,
    name: &str,
    graph: WorkflowGraph,
) -> WorkflowDefinition {
    let definition = state
        .definitions
        .create(
            tenant,
            CreateDefinitionRequest {
                name: name.to_string(),
                version: None,
                category: "sales".to_string(),
                graph,
                trigger_config: None,
            },
        )
        .await
        .unwrap();
    state.definitions.publish(tenant, definition.id).await.unwrap();
    state.definitions.activate(tenant, definition.id).await.unwrap()
}

async fn wait_for_terminal(state: &AppState, tenant: Uuid, execution_id: Uuid) -> ExecutionStatus {
    for _ in 0..300 {
        let detail = state.executions.get(tenant, execution_id).await.unwrap();
        if detail.execution.status.is_terminal() {
            return detail.execution.status;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("execution never reached a terminal status");
}

#[tokio::test]
async fn happy_path_run_completes_with_full_progress() {
    let state = AppState::local(AppConfig::default());
    let tenant = Uuid::new_v4();

    let graph = WorkflowGraph {
        steps: vec![
            event("start", "start"),
            service_step("qualify", serde_json::json!({})),
            service_step("propose", serde_json::json!({})),
            event("end", "end"),
        ],
        connections: chain(&["start", "qualify", "propose", "end"]),
        variables: vec![],
    };
    let definition = register(&state, tenant, "lead_flow", graph).await;

    let execution = state
        .coordinator
        .start(
            tenant,
            definition.id,
            "manual",
            serde_json::json!({}),
            serde_json::json!({"amount": 10}),
        )
        .await
        .unwrap();
    assert_eq!(execution.status, ExecutionStatus::Pending);
    assert!(!execution.execution_key.is_empty());

    let status = wait_for_terminal(&state, tenant, execution.id).await;
    assert_eq!(status, ExecutionStatus::Completed);

    let detail = state.executions.get(tenant, execution.id).await.unwrap();
    assert_eq!(detail.execution.progress_percentage, 100);
    assert!(detail.execution.completed_at.is_some());
    assert_eq!(detail.steps.len(), 4);
    assert!(detail
        .steps
        .iter()
        .all(|s| s.status == StepStatus::Completed));
}

#[tokio::test]
async fn failing_step_fails_the_execution() {
    let state = AppState::local(AppConfig::default());
    let tenant = Uuid::new_v4();

    let graph = WorkflowGraph {
        steps: vec![
            event("start", "start"),
            service_step("explode", serde_json::json!({"simulate": "fail", "error": "boom"})),
            event("end", "end"),
        ],
        connections: chain(&["start", "explode", "end"]),
        variables: vec![],
    };
    let definition = register(&state, tenant, "fragile_flow", graph).await;

    let execution = state
        .coordinator
        .start(
            tenant,
            definition.id,
            "manual",
            serde_json::json!({}),
            serde_json::json!({}),
        )
        .await
        .unwrap();

    let status = wait_for_terminal(&state, tenant, execution.id).await;
    assert_eq!(status, ExecutionStatus::Failed);

    let detail = state.executions.get(tenant, execution.id).await.unwrap();
    let error = detail.execution.error_message.unwrap();
    assert!(error.contains("explode"));
    assert!(error.contains("boom"));
    // The end event was never reached.
    assert!(detail.steps.iter().all(|s| s.step_id != "end"));
}

#[tokio::test]
async fn cancelled_execution_stops_the_drive() {
    let state = AppState::local(AppConfig::default());
    let tenant = Uuid::new_v4();

    let graph = WorkflowGraph {
        steps: vec![
            event("start", "start"),
            service_step("work", serde_json::json!({"delay_ms": 5000})),
            event("end", "end"),
        ],
        connections: chain(&["start", "work", "end"]),
        variables: vec![],
    };
    let definition = register(&state, tenant, "cancel_flow", graph).await;

    let execution = state
        .coordinator
        .start(
            tenant,
            definition.id,
            "manual",
            serde_json::json!({}),
            serde_json::json!({}),
        )
        .await
        .unwrap();

    let cancelled = state.coordinator.cancel(tenant, execution.id).await.unwrap();
    assert_eq!(cancelled.status, ExecutionStatus::Cancelled);
    assert!(cancelled.completed_at.is_some());

    // Give any in-flight drive time to observe the status.
    tokio::time::sleep(Duration::from_millis(50)).await;
    let detail = state.executions.get(tenant, execution.id).await.unwrap();
    assert_eq!(detail.execution.status, ExecutionStatus::Cancelled);
}

/// The three-step scenario: step 1 completes, step 2 fails, the
/// execution fails at 33% progress, and a retry resets it to PENDING
/// with zero progress.
#[tokio::test]
async fn three_step_failure_and_retry_scenario() {
    use flowplane_control_plane::engine::{ExecutionCoordinator, StepTracker};
    use flowplane_control_plane::events::EventBus;
    use flowplane_control_plane::storage::{MemoryStore, Store};

    /// Backend that acknowledges and leaves the stepping to the test.
    struct ManualBackend;

    #[async_trait::async_trait]
    impl ProcessBackend for ManualBackend {
        async fn deploy(&self, definition: &WorkflowDefinition) -> AppResult<BackendHandle> {
            Ok(BackendHandle {
                reference: definition.id.to_string(),
            })
        }

        async fn start(
            &self,
            _handle: &BackendHandle,
            _execution_id: Uuid,
            _execution_key: &str,
            _variables: &serde_json::Value,
        ) -> AppResult<()> {
            Ok(())
        }

        async fn cancel(&self, _execution_id: Uuid) -> AppResult<()> {
            Ok(())
        }

        async fn suspend(&self, _execution_id: Uuid) -> AppResult<()> {
            Ok(())
        }

        async fn resume(&self, _execution_id: Uuid) -> AppResult<()> {
            Ok(())
        }
    }

    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let events = EventBus::disabled();
    let tracker = StepTracker::new(store.clone(), events.clone());
    let coordinator = ExecutionCoordinator::new(
        store.clone(),
        events.clone(),
        Arc::new(ManualBackend),
    );
    let cache = Arc::new(flowplane_control_plane::cache::DefinitionCache::new(
        Duration::from_secs(60),
    ));
    let definitions = flowplane_control_plane::services::DefinitionService::new(
        store.clone(),
        cache,
    );

    let tenant = Uuid::new_v4();
    let graph = WorkflowGraph {
        steps: vec![
            event("start", "start"),
            service_step("s1", serde_json::json!({})),
            service_step("s2", serde_json::json!({})),
            service_step("s3", serde_json::json!({})),
            event("end", "end"),
        ],
        connections: chain(&["start", "s1", "s2", "s3", "end"]),
        variables: vec![],
    };
    let definition = definitions
        .create(
            tenant,
            CreateDefinitionRequest {
                name: "three_steps".to_string(),
                version: None,
                category: "general".to_string(),
                graph,
                trigger_config: None,
            },
        )
        .await
        .unwrap();
    definitions.publish(tenant, definition.id).await.unwrap();
    definitions.activate(tenant, definition.id).await.unwrap();

    let execution = coordinator
        .start(
            tenant,
            definition.id,
            "manual",
            serde_json::json!({}),
            serde_json::json!({}),
        )
        .await
        .unwrap();

    // Wait for the RUNNING acknowledgement.
    for _ in 0..100 {
        let stored = store.get_execution_any(execution.id).await.unwrap().unwrap();
        if stored.status == ExecutionStatus::Running {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    // The backend enters the three service steps.
    let s1 = tracker
        .create_step(execution.id, "s1", "Step s1", "service")
        .await
        .unwrap();
    let s2 = tracker
        .create_step(execution.id, "s2", "Step s2", "service")
        .await
        .unwrap();
    tracker
        .create_step(execution.id, "s3", "Step s3", "service")
        .await
        .unwrap();

    // Step 1 completes: 1 of 3 done.
    tracker
        .update_step(s1.id, StepStatus::Completed, None, None, None)
        .await
        .unwrap();
    let stored = store.get_execution_any(execution.id).await.unwrap().unwrap();
    assert_eq!(stored.progress_percentage, 33);
    assert_eq!(stored.status, ExecutionStatus::Running);

    // Step 2 fails: the execution fails, progress still 1 of 3.
    tracker
        .update_step(
            s2.id,
            StepStatus::Failed,
            None,
            None,
            Some("downstream service unavailable".to_string()),
        )
        .await
        .unwrap();
    let stored = store.get_execution_any(execution.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ExecutionStatus::Failed);
    assert_eq!(stored.progress_percentage, 33);
    assert!(stored
        .error_message
        .as_ref()
        .unwrap()
        .contains("downstream service unavailable"));

    // Retry resets progress and returns to PENDING.
    let retried = coordinator.retry(tenant, execution.id).await.unwrap();
    assert_eq!(retried.status, ExecutionStatus::Pending);
    assert_eq!(retried.progress_percentage, 0);
    assert!(retried.error_message.is_none());
    assert!(retried.current_step.is_none());
    assert!(store.list_steps(execution.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn rules_fire_against_entity_events_in_the_local_state() {
    use flowplane_control_plane::services::rule::CreateRuleRequest;

    let state = AppState::local(AppConfig::default());
    let tenant = Uuid::new_v4();

    state
        .rules
        .create(
            tenant,
            CreateRuleRequest {
                name: "large_deal_alert".to_string(),
                entity_type: "deal".to_string(),
                rule_type: "automation".to_string(),
                priority: 5,
                conditions: serde_json::json!(
                    {"field": "amount", "operator": "greater_than", "value": 1000}
                ),
                actions: serde_json::json!([
                    {"type": "send_notification", "recipient": "mgr@x", "message": "large deal"}
                ]),
            },
        )
        .await
        .unwrap();

    let records = state
        .rule_engine
        .fire_rules(
            tenant,
            "deal",
            "d-42",
            "updated",
            &serde_json::json!({"amount": 1500}),
        )
        .await
        .unwrap();

    assert_eq!(records.len(), 1);
    assert_eq!(
        records[0].status,
        flowplane_control_plane::model::RuleExecutionStatus::Completed
    );

    let stats = state.stats.dashboard(tenant).await.unwrap();
    assert_eq!(stats.rule_executions_by_status.len(), 1);
    assert_eq!(stats.rule_executions_by_status[0].count, 1);
}
