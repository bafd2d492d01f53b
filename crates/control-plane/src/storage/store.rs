//! The persistent-store trait.
//!
//! All lookups are tenant-scoped where the caller acts on behalf of a
//! tenant; a tenant mismatch behaves exactly like a missing row. Internal
//! paths (step tracker, progress rollup, local backend) address
//! executions by id alone.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppResult;
use crate::model::{
    BusinessRule, ExecutionFilter, ExecutionStatus, RuleExecution, RuleExecutionStatus,
    StepCounts, WorkflowDefinition, WorkflowExecution, WorkflowStepExecution,
};

/// Partial update applied to an execution during a guarded transition.
///
/// `None` keeps the stored value; the nested options clear nullable
/// columns explicitly.
#[derive(Debug, Clone, Default)]
pub struct ExecutionChange {
    pub status: Option<ExecutionStatus>,
    pub progress_percentage: Option<i32>,
    pub current_step: Option<Option<String>>,
    pub completed_at: Option<Option<DateTime<Utc>>>,
    pub error_message: Option<Option<String>>,
}

impl ExecutionChange {
    /// Apply this change to an execution record.
    pub fn apply(&self, execution: &mut WorkflowExecution) {
        if let Some(status) = self.status {
            execution.status = status;
        }
        if let Some(progress) = self.progress_percentage {
            execution.progress_percentage = progress;
        }
        if let Some(current_step) = &self.current_step {
            execution.current_step = current_step.clone();
        }
        if let Some(completed_at) = self.completed_at {
            execution.completed_at = completed_at;
        }
        if let Some(error_message) = &self.error_message {
            execution.error_message = error_message.clone();
        }
    }
}

/// Outcome of a status-guarded execution update.
#[derive(Debug, Clone)]
pub enum Transition {
    /// The guard held and the change was applied.
    Applied(WorkflowExecution),
    /// The stored status was not in the allowed set; nothing changed.
    Rejected { current: ExecutionStatus },
    /// No such execution.
    Missing,
}

/// Persistent store for definitions, executions, steps, rules and rule
/// executions.
#[async_trait]
pub trait Store: Send + Sync {
    // ------------------------------------------------------------------
    // Workflow definitions
    // ------------------------------------------------------------------

    /// Insert a new definition version.
    async fn insert_definition(&self, definition: &WorkflowDefinition) -> AppResult<()>;

    /// Update a definition row in place (graph, category, flags).
    async fn update_definition(&self, definition: &WorkflowDefinition) -> AppResult<()>;

    /// Fetch a definition by tenant and id.
    async fn get_definition(
        &self,
        tenant_id: Uuid,
        definition_id: Uuid,
    ) -> AppResult<Option<WorkflowDefinition>>;

    /// All stored version strings for a definition name.
    async fn definition_versions(&self, tenant_id: Uuid, name: &str) -> AppResult<Vec<String>>;

    /// List definitions for a tenant, optionally filtered by category.
    async fn list_definitions(
        &self,
        tenant_id: Uuid,
        category: Option<&str>,
    ) -> AppResult<Vec<WorkflowDefinition>>;

    /// Definition counts grouped by category.
    async fn count_definitions_by_category(&self, tenant_id: Uuid)
        -> AppResult<Vec<(String, i64)>>;

    // ------------------------------------------------------------------
    // Workflow executions
    // ------------------------------------------------------------------

    /// Insert a new execution.
    async fn insert_execution(&self, execution: &WorkflowExecution) -> AppResult<()>;

    /// Fetch an execution by tenant and id.
    async fn get_execution(
        &self,
        tenant_id: Uuid,
        execution_id: Uuid,
    ) -> AppResult<Option<WorkflowExecution>>;

    /// Fetch an execution by id alone (internal paths).
    async fn get_execution_any(&self, execution_id: Uuid)
        -> AppResult<Option<WorkflowExecution>>;

    /// List executions for a tenant with optional status/definition
    /// filters.
    async fn list_executions(
        &self,
        tenant_id: Uuid,
        filter: &ExecutionFilter,
    ) -> AppResult<Vec<WorkflowExecution>>;

    /// Apply a change to an execution iff its status is in `allowed_from`.
    ///
    /// The guard and the update are atomic per execution, which
    /// serializes racing transitions (suspend vs. step completion vs.
    /// cancel) without cross-execution coordination.
    async fn transition_execution(
        &self,
        execution_id: Uuid,
        allowed_from: &[ExecutionStatus],
        change: ExecutionChange,
    ) -> AppResult<Transition>;

    /// Execution counts grouped by status.
    async fn count_executions_by_status(
        &self,
        tenant_id: Uuid,
    ) -> AppResult<Vec<(ExecutionStatus, i64)>>;

    // ------------------------------------------------------------------
    // Step executions
    // ------------------------------------------------------------------

    /// Insert a step execution unless one exists for the same
    /// (execution, step id); returns the stored record either way.
    async fn create_step_if_absent(
        &self,
        step: &WorkflowStepExecution,
    ) -> AppResult<WorkflowStepExecution>;

    /// Fetch a step execution by id.
    async fn get_step(
        &self,
        step_execution_id: Uuid,
    ) -> AppResult<Option<WorkflowStepExecution>>;

    /// Overwrite a step execution (last write wins).
    async fn update_step(&self, step: &WorkflowStepExecution) -> AppResult<()>;

    /// All step executions for an execution, oldest first.
    async fn list_steps(&self, execution_id: Uuid) -> AppResult<Vec<WorkflowStepExecution>>;

    /// Remove all step executions for an execution (retry reset).
    async fn delete_steps(&self, execution_id: Uuid) -> AppResult<()>;

    /// Step counts by status for an execution.
    async fn count_steps_by_status(&self, execution_id: Uuid) -> AppResult<StepCounts>;

    // ------------------------------------------------------------------
    // Business rules
    // ------------------------------------------------------------------

    /// Insert a new rule.
    async fn insert_rule(&self, rule: &BusinessRule) -> AppResult<()>;

    /// Overwrite a rule.
    async fn update_rule(&self, rule: &BusinessRule) -> AppResult<()>;

    /// Delete a rule; returns whether a row was removed.
    async fn delete_rule(&self, tenant_id: Uuid, rule_id: Uuid) -> AppResult<bool>;

    /// Fetch a rule by tenant and id.
    async fn get_rule(&self, tenant_id: Uuid, rule_id: Uuid) -> AppResult<Option<BusinessRule>>;

    /// List rules for a tenant, optionally filtered by entity type.
    async fn list_rules(
        &self,
        tenant_id: Uuid,
        entity_type: Option<&str>,
    ) -> AppResult<Vec<BusinessRule>>;

    /// Active rules for an entity type, priority DESC with id ASC
    /// tie-break for deterministic evaluation order.
    async fn active_rules_for_entity(
        &self,
        tenant_id: Uuid,
        entity_type: &str,
    ) -> AppResult<Vec<BusinessRule>>;

    // ------------------------------------------------------------------
    // Rule executions
    // ------------------------------------------------------------------

    /// Append a rule execution audit record.
    async fn insert_rule_execution(&self, record: &RuleExecution) -> AppResult<()>;

    /// Recent rule executions for a tenant, newest first.
    async fn list_rule_executions(
        &self,
        tenant_id: Uuid,
        rule_id: Option<Uuid>,
        limit: i64,
    ) -> AppResult<Vec<RuleExecution>>;

    /// Rule execution counts grouped by status.
    async fn count_rule_executions_by_status(
        &self,
        tenant_id: Uuid,
    ) -> AppResult<Vec<(RuleExecutionStatus, i64)>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_change_apply() {
        let mut execution = WorkflowExecution::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "manual",
            serde_json::json!({}),
            serde_json::json!({}),
        );
        execution.error_message = Some("boom".to_string());
        execution.progress_percentage = 66;

        let change = ExecutionChange {
            status: Some(ExecutionStatus::Pending),
            progress_percentage: Some(0),
            current_step: Some(None),
            completed_at: Some(None),
            error_message: Some(None),
        };
        change.apply(&mut execution);

        assert_eq!(execution.status, ExecutionStatus::Pending);
        assert_eq!(execution.progress_percentage, 0);
        assert!(execution.current_step.is_none());
        assert!(execution.completed_at.is_none());
        assert!(execution.error_message.is_none());
    }

    #[test]
    fn test_execution_change_default_keeps_values() {
        let mut execution = WorkflowExecution::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "manual",
            serde_json::json!({}),
            serde_json::json!({}),
        );
        execution.progress_percentage = 40;

        ExecutionChange::default().apply(&mut execution);
        assert_eq!(execution.progress_percentage, 40);
        assert_eq!(execution.status, ExecutionStatus::Pending);
    }
}
