//! Execution query service.
//!
//! Read-side operations over executions and their steps. Lifecycle
//! commands (start, cancel, suspend, resume, retry) live on the engine's
//! execution coordinator.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::model::{ExecutionFilter, WorkflowExecution, WorkflowStepExecution};
use crate::storage::Store;

/// An execution together with its step records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionDetail {
    pub execution: WorkflowExecution,
    pub steps: Vec<WorkflowStepExecution>,
}

/// Service for execution queries.
pub struct ExecutionService {
    store: Arc<dyn Store>,
}

impl ExecutionService {
    /// Create a new execution service.
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Fetch an execution with its steps.
    pub async fn get(&self, tenant_id: Uuid, execution_id: Uuid) -> AppResult<ExecutionDetail> {
        let Some(execution) = self.store.get_execution(tenant_id, execution_id).await? else {
            return Err(AppError::NotFound(format!(
                "Execution not found: {}",
                execution_id
            )));
        };

        let steps = self.store.list_steps(execution_id).await?;
        Ok(ExecutionDetail { execution, steps })
    }

    /// List executions with optional status/definition filters.
    pub async fn list(
        &self,
        tenant_id: Uuid,
        filter: &ExecutionFilter,
    ) -> AppResult<Vec<WorkflowExecution>> {
        self.store.list_executions(tenant_id, filter).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ExecutionStatus, StepStatus};
    use crate::storage::MemoryStore;

    #[tokio::test]
    async fn test_get_returns_execution_with_steps() {
        let store = Arc::new(MemoryStore::new());
        let tenant = Uuid::new_v4();

        let execution = WorkflowExecution::new(
            tenant,
            Uuid::new_v4(),
            "manual",
            serde_json::json!({}),
            serde_json::json!({}),
        );
        store.insert_execution(&execution).await.unwrap();

        let mut step = WorkflowStepExecution::new(execution.id, "a", "A", "service");
        step.status = StepStatus::Completed;
        store.create_step_if_absent(&step).await.unwrap();

        let service = ExecutionService::new(store);
        let detail = service.get(tenant, execution.id).await.unwrap();
        assert_eq!(detail.execution.id, execution.id);
        assert_eq!(detail.steps.len(), 1);
        assert_eq!(detail.steps[0].step_id, "a");
    }

    #[tokio::test]
    async fn test_get_scopes_by_tenant() {
        let store = Arc::new(MemoryStore::new());
        let execution = WorkflowExecution::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "manual",
            serde_json::json!({}),
            serde_json::json!({}),
        );
        store.insert_execution(&execution).await.unwrap();

        let service = ExecutionService::new(store);
        let err = service.get(Uuid::new_v4(), execution.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list_by_status() {
        let store = Arc::new(MemoryStore::new());
        let tenant = Uuid::new_v4();

        let mut running = WorkflowExecution::new(
            tenant,
            Uuid::new_v4(),
            "manual",
            serde_json::json!({}),
            serde_json::json!({}),
        );
        running.status = ExecutionStatus::Running;
        store.insert_execution(&running).await.unwrap();

        let pending = WorkflowExecution::new(
            tenant,
            Uuid::new_v4(),
            "manual",
            serde_json::json!({}),
            serde_json::json!({}),
        );
        store.insert_execution(&pending).await.unwrap();

        let service = ExecutionService::new(store);
        let listed = service
            .list(
                tenant,
                &ExecutionFilter {
                    status: Some(ExecutionStatus::Running),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, running.id);
    }
}
