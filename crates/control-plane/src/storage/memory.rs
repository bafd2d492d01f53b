//! In-memory store implementation.
//!
//! Backs tests and the local CLI runtime with the same semantics as the
//! PostgreSQL implementation. Guarded transitions hold the write lock for
//! the whole check-and-update, which serializes racing transitions the
//! way the row lock does in Postgres.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::error::AppResult;
use crate::model::definition::parse_version;
use crate::model::{
    BusinessRule, ExecutionFilter, ExecutionStatus, RuleExecution, RuleExecutionStatus,
    StepCounts, StepStatus, WorkflowDefinition, WorkflowExecution, WorkflowStepExecution,
};
use crate::storage::store::{ExecutionChange, Store, Transition};

/// In-memory implementation of [`Store`].
#[derive(Default)]
pub struct MemoryStore {
    definitions: RwLock<HashMap<Uuid, WorkflowDefinition>>,
    executions: RwLock<HashMap<Uuid, WorkflowExecution>>,
    steps: RwLock<HashMap<Uuid, WorkflowStepExecution>>,
    rules: RwLock<HashMap<Uuid, BusinessRule>>,
    rule_executions: RwLock<Vec<RuleExecution>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored executions.
    pub fn execution_count(&self) -> usize {
        self.executions.read().len()
    }

    /// Number of stored rule execution records.
    pub fn rule_execution_count(&self) -> usize {
        self.rule_executions.read().len()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_definition(&self, definition: &WorkflowDefinition) -> AppResult<()> {
        self.definitions
            .write()
            .insert(definition.id, definition.clone());
        Ok(())
    }

    async fn update_definition(&self, definition: &WorkflowDefinition) -> AppResult<()> {
        self.definitions
            .write()
            .insert(definition.id, definition.clone());
        Ok(())
    }

    async fn get_definition(
        &self,
        tenant_id: Uuid,
        definition_id: Uuid,
    ) -> AppResult<Option<WorkflowDefinition>> {
        Ok(self
            .definitions
            .read()
            .get(&definition_id)
            .filter(|d| d.tenant_id == tenant_id)
            .cloned())
    }

    async fn definition_versions(&self, tenant_id: Uuid, name: &str) -> AppResult<Vec<String>> {
        Ok(self
            .definitions
            .read()
            .values()
            .filter(|d| d.tenant_id == tenant_id && d.name == name)
            .map(|d| d.version.clone())
            .collect())
    }

    async fn list_definitions(
        &self,
        tenant_id: Uuid,
        category: Option<&str>,
    ) -> AppResult<Vec<WorkflowDefinition>> {
        let mut definitions: Vec<WorkflowDefinition> = self
            .definitions
            .read()
            .values()
            .filter(|d| d.tenant_id == tenant_id)
            .filter(|d| category.map_or(true, |c| d.category == c))
            .cloned()
            .collect();
        definitions.sort_by(|a, b| {
            a.name.cmp(&b.name).then(
                parse_version(&b.version)
                    .cmp(&parse_version(&a.version)),
            )
        });
        Ok(definitions)
    }

    async fn count_definitions_by_category(
        &self,
        tenant_id: Uuid,
    ) -> AppResult<Vec<(String, i64)>> {
        let mut counts: HashMap<String, i64> = HashMap::new();
        for definition in self.definitions.read().values() {
            if definition.tenant_id == tenant_id {
                *counts.entry(definition.category.clone()).or_insert(0) += 1;
            }
        }
        let mut counts: Vec<(String, i64)> = counts.into_iter().collect();
        counts.sort();
        Ok(counts)
    }

    async fn insert_execution(&self, execution: &WorkflowExecution) -> AppResult<()> {
        self.executions
            .write()
            .insert(execution.id, execution.clone());
        Ok(())
    }

    async fn get_execution(
        &self,
        tenant_id: Uuid,
        execution_id: Uuid,
    ) -> AppResult<Option<WorkflowExecution>> {
        Ok(self
            .executions
            .read()
            .get(&execution_id)
            .filter(|e| e.tenant_id == tenant_id)
            .cloned())
    }

    async fn get_execution_any(
        &self,
        execution_id: Uuid,
    ) -> AppResult<Option<WorkflowExecution>> {
        Ok(self.executions.read().get(&execution_id).cloned())
    }

    async fn list_executions(
        &self,
        tenant_id: Uuid,
        filter: &ExecutionFilter,
    ) -> AppResult<Vec<WorkflowExecution>> {
        let mut executions: Vec<WorkflowExecution> = self
            .executions
            .read()
            .values()
            .filter(|e| e.tenant_id == tenant_id)
            .filter(|e| filter.status.map_or(true, |s| e.status == s))
            .filter(|e| filter.definition_id.map_or(true, |d| e.definition_id == d))
            .cloned()
            .collect();
        executions.sort_by(|a, b| b.started_at.cmp(&a.started_at));

        let offset = filter.offset.unwrap_or(0).max(0) as usize;
        let limit = filter.limit.unwrap_or(50).clamp(1, 200) as usize;
        Ok(executions.into_iter().skip(offset).take(limit).collect())
    }

    async fn transition_execution(
        &self,
        execution_id: Uuid,
        allowed_from: &[ExecutionStatus],
        change: ExecutionChange,
    ) -> AppResult<Transition> {
        let mut executions = self.executions.write();
        let Some(execution) = executions.get_mut(&execution_id) else {
            return Ok(Transition::Missing);
        };
        if !allowed_from.contains(&execution.status) {
            return Ok(Transition::Rejected {
                current: execution.status,
            });
        }
        change.apply(execution);
        Ok(Transition::Applied(execution.clone()))
    }

    async fn count_executions_by_status(
        &self,
        tenant_id: Uuid,
    ) -> AppResult<Vec<(ExecutionStatus, i64)>> {
        let mut counts: HashMap<ExecutionStatus, i64> = HashMap::new();
        for execution in self.executions.read().values() {
            if execution.tenant_id == tenant_id {
                *counts.entry(execution.status).or_insert(0) += 1;
            }
        }
        let mut counts: Vec<(ExecutionStatus, i64)> = counts.into_iter().collect();
        counts.sort_by_key(|(status, _)| status.to_string());
        Ok(counts)
    }

    async fn create_step_if_absent(
        &self,
        step: &WorkflowStepExecution,
    ) -> AppResult<WorkflowStepExecution> {
        let mut steps = self.steps.write();
        if let Some(existing) = steps
            .values()
            .find(|s| s.execution_id == step.execution_id && s.step_id == step.step_id)
        {
            return Ok(existing.clone());
        }
        steps.insert(step.id, step.clone());
        Ok(step.clone())
    }

    async fn get_step(
        &self,
        step_execution_id: Uuid,
    ) -> AppResult<Option<WorkflowStepExecution>> {
        Ok(self.steps.read().get(&step_execution_id).cloned())
    }

    async fn update_step(&self, step: &WorkflowStepExecution) -> AppResult<()> {
        self.steps.write().insert(step.id, step.clone());
        Ok(())
    }

    async fn list_steps(&self, execution_id: Uuid) -> AppResult<Vec<WorkflowStepExecution>> {
        let mut steps: Vec<WorkflowStepExecution> = self
            .steps
            .read()
            .values()
            .filter(|s| s.execution_id == execution_id)
            .cloned()
            .collect();
        steps.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        Ok(steps)
    }

    async fn delete_steps(&self, execution_id: Uuid) -> AppResult<()> {
        self.steps
            .write()
            .retain(|_, step| step.execution_id != execution_id);
        Ok(())
    }

    async fn count_steps_by_status(&self, execution_id: Uuid) -> AppResult<StepCounts> {
        let mut counts = StepCounts::default();
        for step in self.steps.read().values() {
            if step.execution_id != execution_id {
                continue;
            }
            counts.total += 1;
            match step.status {
                StepStatus::Running => counts.running += 1,
                StepStatus::Completed => counts.completed += 1,
                StepStatus::Failed => counts.failed += 1,
                StepStatus::Skipped => counts.skipped += 1,
            }
        }
        Ok(counts)
    }

    async fn insert_rule(&self, rule: &BusinessRule) -> AppResult<()> {
        self.rules.write().insert(rule.id, rule.clone());
        Ok(())
    }

    async fn update_rule(&self, rule: &BusinessRule) -> AppResult<()> {
        self.rules.write().insert(rule.id, rule.clone());
        Ok(())
    }

    async fn delete_rule(&self, tenant_id: Uuid, rule_id: Uuid) -> AppResult<bool> {
        let mut rules = self.rules.write();
        match rules.get(&rule_id) {
            Some(rule) if rule.tenant_id == tenant_id => {
                rules.remove(&rule_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn get_rule(&self, tenant_id: Uuid, rule_id: Uuid) -> AppResult<Option<BusinessRule>> {
        Ok(self
            .rules
            .read()
            .get(&rule_id)
            .filter(|r| r.tenant_id == tenant_id)
            .cloned())
    }

    async fn list_rules(
        &self,
        tenant_id: Uuid,
        entity_type: Option<&str>,
    ) -> AppResult<Vec<BusinessRule>> {
        let mut rules: Vec<BusinessRule> = self
            .rules
            .read()
            .values()
            .filter(|r| r.tenant_id == tenant_id)
            .filter(|r| entity_type.map_or(true, |t| r.entity_type == t))
            .cloned()
            .collect();
        rules.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.id.cmp(&b.id)));
        Ok(rules)
    }

    async fn active_rules_for_entity(
        &self,
        tenant_id: Uuid,
        entity_type: &str,
    ) -> AppResult<Vec<BusinessRule>> {
        let mut rules: Vec<BusinessRule> = self
            .rules
            .read()
            .values()
            .filter(|r| r.tenant_id == tenant_id && r.entity_type == entity_type && r.is_active)
            .cloned()
            .collect();
        rules.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.id.cmp(&b.id)));
        Ok(rules)
    }

    async fn insert_rule_execution(&self, record: &RuleExecution) -> AppResult<()> {
        self.rule_executions.write().push(record.clone());
        Ok(())
    }

    async fn list_rule_executions(
        &self,
        tenant_id: Uuid,
        rule_id: Option<Uuid>,
        limit: i64,
    ) -> AppResult<Vec<RuleExecution>> {
        let mut records: Vec<RuleExecution> = self
            .rule_executions
            .read()
            .iter()
            .filter(|r| r.tenant_id == tenant_id)
            .filter(|r| rule_id.map_or(true, |id| r.rule_id == id))
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records.truncate(limit.clamp(1, 500) as usize);
        Ok(records)
    }

    async fn count_rule_executions_by_status(
        &self,
        tenant_id: Uuid,
    ) -> AppResult<Vec<(RuleExecutionStatus, i64)>> {
        let mut counts: HashMap<RuleExecutionStatus, i64> = HashMap::new();
        for record in self.rule_executions.read().iter() {
            if record.tenant_id == tenant_id {
                *counts.entry(record.status).or_insert(0) += 1;
            }
        }
        let mut counts: Vec<(RuleExecutionStatus, i64)> = counts.into_iter().collect();
        counts.sort_by_key(|(status, _)| status.to_string());
        Ok(counts)
    }
}
