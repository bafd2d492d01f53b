//! The execution lifecycle coordinator.
//!
//! Owns every WorkflowExecution status transition. Starting and retrying
//! hand the actual drive to the process backend on a spawned task and
//! return immediately; all transitions are status-guarded updates against
//! the store, so racing requests resolve against the persisted status.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::engine::backend::ProcessBackend;
use crate::engine::progress;
use crate::error::{AppError, AppResult};
use crate::events::{EventBus, EXECUTIONS_SUBJECT};
use crate::model::{ExecutionStatus, WorkflowDefinition, WorkflowExecution};
use crate::result_ext::ResultExt;
use crate::storage::store::{ExecutionChange, Store, Transition};

/// Creates, starts, cancels, suspends, resumes and retries workflow
/// executions.
pub struct ExecutionCoordinator {
    store: Arc<dyn Store>,
    events: EventBus,
    backend: Arc<dyn ProcessBackend>,
}

impl ExecutionCoordinator {
    /// Create a new execution coordinator.
    pub fn new(
        store: Arc<dyn Store>,
        events: EventBus,
        backend: Arc<dyn ProcessBackend>,
    ) -> Self {
        Self {
            store,
            events,
            backend,
        }
    }

    /// Start a new execution of a definition.
    ///
    /// The definition must be active and published. The execution is
    /// created in PENDING and returned immediately; the backend hand-off
    /// happens on a spawned task, and the PENDING → RUNNING transition
    /// follows the backend's acknowledgement.
    pub async fn start(
        &self,
        tenant_id: Uuid,
        definition_id: Uuid,
        trigger_type: &str,
        trigger_data: serde_json::Value,
        variables: serde_json::Value,
    ) -> AppResult<WorkflowExecution> {
        let Some(definition) = self.store.get_definition(tenant_id, definition_id).await? else {
            return Err(AppError::NotFound(format!(
                "Workflow definition not found: {}",
                definition_id
            )));
        };

        if !definition.is_startable() {
            return Err(AppError::validation(format!(
                "definition '{}' version {} is not active and published",
                definition.name, definition.version
            )));
        }

        let execution = WorkflowExecution::new(
            tenant_id,
            definition_id,
            trigger_type,
            trigger_data,
            variables,
        );
        self.store.insert_execution(&execution).await?;

        tracing::info!(
            execution_id = %execution.id,
            execution_key = %execution.execution_key,
            definition = %definition.name,
            "Execution created"
        );

        self.events
            .emit(
                EXECUTIONS_SUBJECT,
                "execution.created",
                serde_json::json!({
                    "execution_id": execution.id,
                    "tenant_id": tenant_id,
                    "execution_key": execution.execution_key,
                    "definition_id": definition_id,
                    "trigger_type": execution.trigger_type,
                }),
            )
            .await;

        self.spawn_start(definition, execution.clone());

        Ok(execution)
    }

    /// Cancel an execution. Legal from PENDING, RUNNING and SUSPENDED.
    pub async fn cancel(
        &self,
        tenant_id: Uuid,
        execution_id: Uuid,
    ) -> AppResult<WorkflowExecution> {
        self.require_execution(tenant_id, execution_id).await?;

        let change = ExecutionChange {
            status: Some(ExecutionStatus::Cancelled),
            completed_at: Some(Some(Utc::now())),
            ..Default::default()
        };
        let cancelled = self
            .apply_transition(
                execution_id,
                &[
                    ExecutionStatus::Pending,
                    ExecutionStatus::Running,
                    ExecutionStatus::Suspended,
                ],
                change,
                "cancel",
            )
            .await?;

        let _ = self
            .backend
            .cancel(execution_id)
            .await
            .log("requesting backend abandon");

        self.emit_lifecycle("execution.cancelled", &cancelled).await;
        Ok(cancelled)
    }

    /// Suspend a running execution.
    pub async fn suspend(
        &self,
        tenant_id: Uuid,
        execution_id: Uuid,
    ) -> AppResult<WorkflowExecution> {
        self.require_execution(tenant_id, execution_id).await?;

        let change = ExecutionChange {
            status: Some(ExecutionStatus::Suspended),
            ..Default::default()
        };
        let suspended = self
            .apply_transition(execution_id, &[ExecutionStatus::Running], change, "suspend")
            .await?;

        let _ = self
            .backend
            .suspend(execution_id)
            .await
            .log("requesting backend suspend");

        self.emit_lifecycle("execution.suspended", &suspended).await;
        Ok(suspended)
    }

    /// Resume a suspended execution.
    pub async fn resume(
        &self,
        tenant_id: Uuid,
        execution_id: Uuid,
    ) -> AppResult<WorkflowExecution> {
        self.require_execution(tenant_id, execution_id).await?;

        let change = ExecutionChange {
            status: Some(ExecutionStatus::Running),
            ..Default::default()
        };
        let resumed = self
            .apply_transition(execution_id, &[ExecutionStatus::Suspended], change, "resume")
            .await?;

        let _ = self
            .backend
            .resume(execution_id)
            .await
            .log("requesting backend resume");

        self.emit_lifecycle("execution.resumed", &resumed).await;
        Ok(resumed)
    }

    /// Retry a failed execution: the only exit from a terminal status.
    ///
    /// Resets progress, error and current step, returns the execution to
    /// PENDING and re-enters start's asynchronous path.
    pub async fn retry(
        &self,
        tenant_id: Uuid,
        execution_id: Uuid,
    ) -> AppResult<WorkflowExecution> {
        let execution = self.require_execution(tenant_id, execution_id).await?;

        let Some(definition) = self
            .store
            .get_definition(tenant_id, execution.definition_id)
            .await?
        else {
            return Err(AppError::NotFound(format!(
                "Workflow definition not found: {}",
                execution.definition_id
            )));
        };

        let change = ExecutionChange {
            status: Some(ExecutionStatus::Pending),
            progress_percentage: Some(0),
            current_step: Some(None),
            completed_at: Some(None),
            error_message: Some(None),
        };
        let retried = self
            .apply_transition(execution_id, &[ExecutionStatus::Failed], change, "retry")
            .await?;

        // Progress restarts from a clean slate of step records.
        self.store.delete_steps(execution_id).await?;

        self.emit_lifecycle("execution.retried", &retried).await;
        self.spawn_start(definition, retried.clone());
        Ok(retried)
    }

    /// Recompute progress for an execution after a step transition.
    pub async fn refresh_progress(
        &self,
        execution_id: Uuid,
    ) -> AppResult<Option<WorkflowExecution>> {
        progress::refresh(self.store.as_ref(), &self.events, execution_id).await
    }

    /// Hand an execution to the backend without blocking the caller.
    ///
    /// On acknowledgement the execution moves PENDING → RUNNING; a
    /// backend error moves it to FAILED. Either transition is dropped if
    /// the execution was cancelled in the meantime.
    fn spawn_start(&self, definition: WorkflowDefinition, execution: WorkflowExecution) {
        let store = self.store.clone();
        let events = self.events.clone();
        let backend = self.backend.clone();

        tokio::spawn(async move {
            let handoff = async {
                let handle = backend.deploy(&definition).await?;
                backend
                    .start(
                        &handle,
                        execution.id,
                        &execution.execution_key,
                        &execution.variables,
                    )
                    .await
            }
            .await;

            let (change, event_type) = match handoff {
                Ok(()) => (
                    ExecutionChange {
                        status: Some(ExecutionStatus::Running),
                        ..Default::default()
                    },
                    "execution.started",
                ),
                Err(e) => {
                    tracing::warn!(
                        execution_id = %execution.id,
                        error = %e,
                        "Backend hand-off failed"
                    );
                    (
                        ExecutionChange {
                            status: Some(ExecutionStatus::Failed),
                            completed_at: Some(Some(Utc::now())),
                            error_message: Some(Some(e.to_string())),
                            ..Default::default()
                        },
                        "execution.failed",
                    )
                }
            };

            let outcome = store
                .transition_execution(execution.id, &[ExecutionStatus::Pending], change)
                .await;
            match outcome {
                Ok(Transition::Applied(updated)) => {
                    events
                        .emit(
                            EXECUTIONS_SUBJECT,
                            event_type,
                            serde_json::json!({
                                "execution_id": updated.id,
                                "tenant_id": updated.tenant_id,
                                "execution_key": updated.execution_key,
                                "status": updated.status,
                                "error_message": updated.error_message,
                            }),
                        )
                        .await;
                }
                Ok(Transition::Rejected { current }) => {
                    tracing::debug!(
                        execution_id = %execution.id,
                        current = %current,
                        "Dropping backend acknowledgement, execution already transitioned"
                    );
                }
                Ok(Transition::Missing) => {
                    tracing::warn!(execution_id = %execution.id, "Execution vanished during hand-off");
                }
                Err(e) => {
                    tracing::error!(
                        execution_id = %execution.id,
                        error = %e,
                        "Failed to persist backend acknowledgement"
                    );
                }
            }
        });
    }

    /// Fetch an execution scoped to a tenant; a mismatch is a not-found.
    async fn require_execution(
        &self,
        tenant_id: Uuid,
        execution_id: Uuid,
    ) -> AppResult<WorkflowExecution> {
        self.store
            .get_execution(tenant_id, execution_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("Execution not found: {}", execution_id))
            })
    }

    /// Apply a guarded transition, mapping a rejected guard to an
    /// InvalidTransition error.
    async fn apply_transition(
        &self,
        execution_id: Uuid,
        allowed_from: &[ExecutionStatus],
        change: ExecutionChange,
        action: &str,
    ) -> AppResult<WorkflowExecution> {
        match self
            .store
            .transition_execution(execution_id, allowed_from, change)
            .await?
        {
            Transition::Applied(execution) => Ok(execution),
            Transition::Rejected { current } => Err(AppError::InvalidTransition(format!(
                "cannot {} execution {} in {} state",
                action, execution_id, current
            ))),
            Transition::Missing => Err(AppError::NotFound(format!(
                "Execution not found: {}",
                execution_id
            ))),
        }
    }

    async fn emit_lifecycle(&self, event_type: &str, execution: &WorkflowExecution) {
        self.events
            .emit(
                EXECUTIONS_SUBJECT,
                event_type,
                serde_json::json!({
                    "execution_id": execution.id,
                    "tenant_id": execution.tenant_id,
                    "execution_key": execution.execution_key,
                    "status": execution.status,
                    "progress_percentage": execution.progress_percentage,
                }),
            )
            .await;
    }
}
