//! Step execution tracking.
//!
//! The process backend reports step lifecycles here. Creation is
//! idempotent per (execution, step id) and updates are last-write-wins,
//! so duplicate or out-of-order backend deliveries are harmless. Every
//! update triggers the coordinator's progress rollup for the owning
//! execution.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::engine::progress;
use crate::error::{AppError, AppResult};
use crate::events::{EventBus, EXECUTIONS_SUBJECT};
use crate::model::{StepStatus, WorkflowStepExecution};
use crate::storage::Store;

/// Records per-step status and timing for running executions.
pub struct StepTracker {
    store: Arc<dyn Store>,
    events: EventBus,
}

impl StepTracker {
    /// Create a new step tracker.
    pub fn new(store: Arc<dyn Store>, events: EventBus) -> Self {
        Self { store, events }
    }

    /// Record that a step was entered.
    ///
    /// Idempotent: re-creating an existing (execution, step id) pair is a
    /// no-op returning the stored record.
    pub async fn create_step(
        &self,
        execution_id: Uuid,
        step_id: &str,
        step_name: &str,
        step_type: &str,
    ) -> AppResult<WorkflowStepExecution> {
        let candidate = WorkflowStepExecution::new(execution_id, step_id, step_name, step_type);
        let stored = self.store.create_step_if_absent(&candidate).await?;

        if stored.id == candidate.id {
            tracing::debug!(
                execution_id = %execution_id,
                step_id = %step_id,
                "Step entered"
            );
            progress::refresh(self.store.as_ref(), &self.events, execution_id).await?;
            self.events
                .emit(
                    EXECUTIONS_SUBJECT,
                    "step.started",
                    serde_json::json!({
                        "execution_id": execution_id,
                        "step_execution_id": stored.id,
                        "step_id": step_id,
                        "step_type": stored.step_type,
                    }),
                )
                .await;
        }

        Ok(stored)
    }

    /// Update a step's status and data, last write wins.
    pub async fn update_step(
        &self,
        step_execution_id: Uuid,
        status: StepStatus,
        input_data: Option<serde_json::Value>,
        output_data: Option<serde_json::Value>,
        error_message: Option<String>,
    ) -> AppResult<WorkflowStepExecution> {
        let Some(mut step) = self.store.get_step(step_execution_id).await? else {
            return Err(AppError::NotFound(format!(
                "Step execution not found: {}",
                step_execution_id
            )));
        };

        step.status = status;
        if input_data.is_some() {
            step.input_data = input_data;
        }
        if output_data.is_some() {
            step.output_data = output_data;
        }
        if error_message.is_some() {
            step.error_message = error_message;
        }
        if status.is_terminal() {
            if step.completed_at.is_none() {
                step.completed_at = Some(Utc::now());
            }
        } else {
            step.completed_at = None;
        }

        self.store.update_step(&step).await?;

        progress::refresh(self.store.as_ref(), &self.events, step.execution_id).await?;

        self.events
            .emit(
                EXECUTIONS_SUBJECT,
                &format!("step.{}", status),
                serde_json::json!({
                    "execution_id": step.execution_id,
                    "step_execution_id": step.id,
                    "step_id": step.step_id,
                    "status": status,
                    "error_message": step.error_message,
                }),
            )
            .await;

        Ok(step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::graph::{Connection, StepDef, StepType, WorkflowGraph};
    use crate::model::{ExecutionStatus, WorkflowDefinition, WorkflowExecution};
    use crate::storage::MemoryStore;
    use std::collections::HashMap;

    fn service_step(id: &str) -> StepDef {
        StepDef {
            id: id.to_string(),
            name: id.to_string(),
            step_type: StepType::Service,
            config: HashMap::new(),
        }
    }

    /// Chain of service steps; the last one is the terminal step.
    fn chain_graph(ids: &[&str]) -> WorkflowGraph {
        WorkflowGraph {
            steps: ids.iter().map(|id| service_step(id)).collect(),
            connections: ids
                .windows(2)
                .map(|pair| Connection {
                    from: pair[0].to_string(),
                    to: pair[1].to_string(),
                    condition: None,
                })
                .collect(),
            variables: vec![],
        }
    }

    /// A RUNNING execution over a definition with the given step chain.
    async fn running_execution(store: &MemoryStore, step_ids: &[&str]) -> WorkflowExecution {
        let tenant_id = Uuid::new_v4();
        let definition = WorkflowDefinition::new(
            tenant_id,
            "flow",
            "1.0",
            "general",
            chain_graph(step_ids),
            None,
        );
        store.insert_definition(&definition).await.unwrap();

        let mut execution = WorkflowExecution::new(
            tenant_id,
            definition.id,
            "manual",
            serde_json::json!({}),
            serde_json::json!({}),
        );
        execution.status = ExecutionStatus::Running;
        store.insert_execution(&execution).await.unwrap();
        execution
    }

    fn tracker(store: Arc<MemoryStore>) -> StepTracker {
        StepTracker::new(store, EventBus::disabled())
    }

    #[tokio::test]
    async fn test_create_step_is_idempotent() {
        let store = Arc::new(MemoryStore::new());
        let execution = running_execution(&store, &["qualify", "close"]).await;
        let tracker = tracker(store.clone());

        let first = tracker
            .create_step(execution.id, "qualify", "Qualify", "service")
            .await
            .unwrap();
        let second = tracker
            .create_step(execution.id, "qualify", "Qualify", "service")
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(
            store.count_steps_by_status(execution.id).await.unwrap().total,
            1
        );
    }

    #[tokio::test]
    async fn test_progress_invariant_after_updates() {
        let store = Arc::new(MemoryStore::new());
        let execution = running_execution(&store, &["a", "b", "c"]).await;
        let tracker = tracker(store.clone());

        let a = tracker
            .create_step(execution.id, "a", "A", "service")
            .await
            .unwrap();
        let b = tracker
            .create_step(execution.id, "b", "B", "service")
            .await
            .unwrap();
        let _c = tracker
            .create_step(execution.id, "c", "C", "service")
            .await
            .unwrap();

        tracker
            .update_step(a.id, StepStatus::Completed, None, None, None)
            .await
            .unwrap();
        let stored = store.get_execution_any(execution.id).await.unwrap().unwrap();
        assert_eq!(stored.progress_percentage, 33);

        tracker
            .update_step(b.id, StepStatus::Skipped, None, None, None)
            .await
            .unwrap();
        let stored = store.get_execution_any(execution.id).await.unwrap().unwrap();
        assert_eq!(stored.progress_percentage, 66);
    }

    #[tokio::test]
    async fn test_all_steps_done_completes_execution() {
        let store = Arc::new(MemoryStore::new());
        let execution = running_execution(&store, &["a"]).await;
        let tracker = tracker(store.clone());

        let a = tracker
            .create_step(execution.id, "a", "A", "service")
            .await
            .unwrap();
        tracker
            .update_step(a.id, StepStatus::Completed, None, None, None)
            .await
            .unwrap();

        let stored = store.get_execution_any(execution.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ExecutionStatus::Completed);
        assert_eq!(stored.progress_percentage, 100);
        assert!(stored.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_failed_step_fails_execution() {
        let store = Arc::new(MemoryStore::new());
        let execution = running_execution(&store, &["a", "b"]).await;
        let tracker = tracker(store.clone());

        let a = tracker
            .create_step(execution.id, "a", "A", "service")
            .await
            .unwrap();
        let b = tracker
            .create_step(execution.id, "b", "B", "service")
            .await
            .unwrap();
        tracker
            .update_step(a.id, StepStatus::Completed, None, None, None)
            .await
            .unwrap();
        tracker
            .update_step(
                b.id,
                StepStatus::Failed,
                None,
                None,
                Some("connector timeout".to_string()),
            )
            .await
            .unwrap();

        let stored = store.get_execution_any(execution.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ExecutionStatus::Failed);
        let error = stored.error_message.unwrap();
        assert!(error.contains("'b'"));
        assert!(error.contains("connector timeout"));
    }

    #[tokio::test]
    async fn test_late_update_after_terminal_is_dropped() {
        let store = Arc::new(MemoryStore::new());
        let execution = running_execution(&store, &["a", "b"]).await;
        let tracker = tracker(store.clone());

        let a = tracker
            .create_step(execution.id, "a", "A", "service")
            .await
            .unwrap();

        // Cancel the execution out from under the tracker.
        store
            .transition_execution(
                execution.id,
                &[ExecutionStatus::Running],
                crate::storage::ExecutionChange {
                    status: Some(ExecutionStatus::Cancelled),
                    completed_at: Some(Some(Utc::now())),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        // The step update still records, but the execution stays
        // cancelled with its progress untouched.
        tracker
            .update_step(a.id, StepStatus::Completed, None, None, None)
            .await
            .unwrap();

        let stored = store.get_execution_any(execution.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ExecutionStatus::Cancelled);
        assert_eq!(stored.progress_percentage, 0);
    }

    #[tokio::test]
    async fn test_update_unknown_step_is_not_found() {
        let store = Arc::new(MemoryStore::new());
        let tracker = tracker(store);

        let err = tracker
            .update_step(Uuid::new_v4(), StepStatus::Completed, None, None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
