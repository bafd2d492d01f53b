//! PostgreSQL store implementation.
//!
//! Runtime-checked SQLx queries over the `flowplane` schema (see
//! `sql/schema.sql`). Guarded execution transitions run inside a
//! transaction with a row lock, which serializes racing transitions per
//! execution.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::model::definition::parse_version;
use crate::model::{
    BusinessRule, ExecutionFilter, ExecutionStatus, RuleExecution, RuleExecutionStatus,
    StepCounts, WorkflowDefinition, WorkflowExecution, WorkflowStepExecution,
};
use crate::storage::pool::DbPool;
use crate::storage::store::{ExecutionChange, Store, Transition};

type DefinitionRow = (
    Uuid,
    Uuid,
    String,
    String,
    String,
    bool,
    bool,
    serde_json::Value,
    Option<serde_json::Value>,
    DateTime<Utc>,
    DateTime<Utc>,
);

type ExecutionRow = (
    Uuid,
    Uuid,
    Uuid,
    String,
    String,
    String,
    serde_json::Value,
    serde_json::Value,
    Option<String>,
    i32,
    DateTime<Utc>,
    Option<DateTime<Utc>>,
    Option<String>,
);

type StepRow = (
    Uuid,
    Uuid,
    String,
    String,
    String,
    String,
    Option<serde_json::Value>,
    Option<serde_json::Value>,
    DateTime<Utc>,
    Option<DateTime<Utc>>,
    Option<String>,
);

type RuleRow = (
    Uuid,
    Uuid,
    String,
    String,
    String,
    i32,
    bool,
    serde_json::Value,
    serde_json::Value,
    DateTime<Utc>,
    DateTime<Utc>,
);

type RuleExecutionRow = (
    Uuid,
    Uuid,
    Uuid,
    String,
    String,
    String,
    serde_json::Value,
    String,
    Option<serde_json::Value>,
    Option<String>,
    i64,
    DateTime<Utc>,
);

const DEFINITION_COLUMNS: &str = "id, tenant_id, name, version, category, is_active, \
     is_published, graph, trigger_config, created_at, updated_at";

const EXECUTION_COLUMNS: &str = "id, tenant_id, definition_id, execution_key, status, \
     trigger_type, trigger_data, variables, current_step, progress_percentage, started_at, \
     completed_at, error_message";

const STEP_COLUMNS: &str = "id, execution_id, step_id, step_name, step_type, status, \
     input_data, output_data, started_at, completed_at, error_message";

const RULE_COLUMNS: &str = "id, tenant_id, name, entity_type, rule_type, priority, \
     is_active, conditions, actions, created_at, updated_at";

const RULE_EXECUTION_COLUMNS: &str = "id, tenant_id, rule_id, entity_id, entity_type, \
     trigger_event, input_data, status, output_data, error_message, duration_ms, created_at";

fn map_definition(row: DefinitionRow) -> AppResult<WorkflowDefinition> {
    let (
        id,
        tenant_id,
        name,
        version,
        category,
        is_active,
        is_published,
        graph,
        trigger_config,
        created_at,
        updated_at,
    ) = row;
    Ok(WorkflowDefinition {
        id,
        tenant_id,
        name,
        version,
        category,
        is_active,
        is_published,
        graph: serde_json::from_value(graph)?,
        trigger_config,
        created_at,
        updated_at,
    })
}

fn map_execution(row: ExecutionRow) -> AppResult<WorkflowExecution> {
    let (
        id,
        tenant_id,
        definition_id,
        execution_key,
        status,
        trigger_type,
        trigger_data,
        variables,
        current_step,
        progress_percentage,
        started_at,
        completed_at,
        error_message,
    ) = row;
    Ok(WorkflowExecution {
        id,
        tenant_id,
        definition_id,
        execution_key,
        status: status.parse().map_err(AppError::Internal)?,
        trigger_type,
        trigger_data,
        variables,
        current_step,
        progress_percentage,
        started_at,
        completed_at,
        error_message,
    })
}

fn map_step(row: StepRow) -> AppResult<WorkflowStepExecution> {
    let (
        id,
        execution_id,
        step_id,
        step_name,
        step_type,
        status,
        input_data,
        output_data,
        started_at,
        completed_at,
        error_message,
    ) = row;
    Ok(WorkflowStepExecution {
        id,
        execution_id,
        step_id,
        step_name,
        step_type,
        status: status.parse().map_err(AppError::Internal)?,
        input_data,
        output_data,
        started_at,
        completed_at,
        error_message,
    })
}

fn map_rule(row: RuleRow) -> BusinessRule {
    let (
        id,
        tenant_id,
        name,
        entity_type,
        rule_type,
        priority,
        is_active,
        conditions,
        actions,
        created_at,
        updated_at,
    ) = row;
    BusinessRule {
        id,
        tenant_id,
        name,
        entity_type,
        rule_type,
        priority,
        is_active,
        conditions,
        actions,
        created_at,
        updated_at,
    }
}

fn map_rule_execution(row: RuleExecutionRow) -> AppResult<RuleExecution> {
    let (
        id,
        tenant_id,
        rule_id,
        entity_id,
        entity_type,
        trigger_event,
        input_data,
        status,
        output_data,
        error_message,
        duration_ms,
        created_at,
    ) = row;
    Ok(RuleExecution {
        id,
        tenant_id,
        rule_id,
        entity_id,
        entity_type,
        trigger_event,
        input_data,
        status: status.parse().map_err(AppError::Internal)?,
        output_data,
        error_message,
        duration_ms,
        created_at,
    })
}

/// PostgreSQL implementation of [`Store`].
#[derive(Clone)]
pub struct PostgresStore {
    pool: DbPool,
}

impl PostgresStore {
    /// Create a store over a connection pool.
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn insert_definition(&self, definition: &WorkflowDefinition) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO flowplane.workflow_definition (
                id, tenant_id, name, version, category, is_active, is_published,
                graph, trigger_config, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(definition.id)
        .bind(definition.tenant_id)
        .bind(&definition.name)
        .bind(&definition.version)
        .bind(&definition.category)
        .bind(definition.is_active)
        .bind(definition.is_published)
        .bind(serde_json::to_value(&definition.graph)?)
        .bind(&definition.trigger_config)
        .bind(definition.created_at)
        .bind(definition.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_definition(&self, definition: &WorkflowDefinition) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE flowplane.workflow_definition
            SET category = $3, is_active = $4, is_published = $5, graph = $6,
                trigger_config = $7, updated_at = $8
            WHERE id = $1 AND tenant_id = $2
            "#,
        )
        .bind(definition.id)
        .bind(definition.tenant_id)
        .bind(&definition.category)
        .bind(definition.is_active)
        .bind(definition.is_published)
        .bind(serde_json::to_value(&definition.graph)?)
        .bind(&definition.trigger_config)
        .bind(definition.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_definition(
        &self,
        tenant_id: Uuid,
        definition_id: Uuid,
    ) -> AppResult<Option<WorkflowDefinition>> {
        let row: Option<DefinitionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM flowplane.workflow_definition WHERE id = $1 AND tenant_id = $2",
            DEFINITION_COLUMNS
        ))
        .bind(definition_id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(map_definition).transpose()
    }

    async fn definition_versions(&self, tenant_id: Uuid, name: &str) -> AppResult<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT version FROM flowplane.workflow_definition
            WHERE tenant_id = $1 AND name = $2
            "#,
        )
        .bind(tenant_id)
        .bind(name)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(v,)| v).collect())
    }

    async fn list_definitions(
        &self,
        tenant_id: Uuid,
        category: Option<&str>,
    ) -> AppResult<Vec<WorkflowDefinition>> {
        let rows: Vec<DefinitionRow> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM flowplane.workflow_definition
            WHERE tenant_id = $1
              AND ($2::TEXT IS NULL OR category = $2)
            ORDER BY name ASC, created_at DESC
            "#,
            DEFINITION_COLUMNS
        ))
        .bind(tenant_id)
        .bind(category)
        .fetch_all(&self.pool)
        .await?;

        let mut definitions: Vec<WorkflowDefinition> = rows
            .into_iter()
            .map(map_definition)
            .collect::<AppResult<_>>()?;
        // Version strings do not sort textually; order per-name in Rust.
        definitions.sort_by(|a, b| {
            a.name
                .cmp(&b.name)
                .then(parse_version(&b.version).cmp(&parse_version(&a.version)))
        });
        Ok(definitions)
    }

    async fn count_definitions_by_category(
        &self,
        tenant_id: Uuid,
    ) -> AppResult<Vec<(String, i64)>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT category, COUNT(*) FROM flowplane.workflow_definition
            WHERE tenant_id = $1
            GROUP BY category
            ORDER BY category
            "#,
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn insert_execution(&self, execution: &WorkflowExecution) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO flowplane.workflow_execution (
                id, tenant_id, definition_id, execution_key, status, trigger_type,
                trigger_data, variables, current_step, progress_percentage,
                started_at, completed_at, error_message
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(execution.id)
        .bind(execution.tenant_id)
        .bind(execution.definition_id)
        .bind(&execution.execution_key)
        .bind(execution.status.to_string())
        .bind(&execution.trigger_type)
        .bind(&execution.trigger_data)
        .bind(&execution.variables)
        .bind(&execution.current_step)
        .bind(execution.progress_percentage)
        .bind(execution.started_at)
        .bind(execution.completed_at)
        .bind(&execution.error_message)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_execution(
        &self,
        tenant_id: Uuid,
        execution_id: Uuid,
    ) -> AppResult<Option<WorkflowExecution>> {
        let row: Option<ExecutionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM flowplane.workflow_execution WHERE id = $1 AND tenant_id = $2",
            EXECUTION_COLUMNS
        ))
        .bind(execution_id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(map_execution).transpose()
    }

    async fn get_execution_any(
        &self,
        execution_id: Uuid,
    ) -> AppResult<Option<WorkflowExecution>> {
        let row: Option<ExecutionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM flowplane.workflow_execution WHERE id = $1",
            EXECUTION_COLUMNS
        ))
        .bind(execution_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(map_execution).transpose()
    }

    async fn list_executions(
        &self,
        tenant_id: Uuid,
        filter: &ExecutionFilter,
    ) -> AppResult<Vec<WorkflowExecution>> {
        let limit = filter.limit.unwrap_or(50).clamp(1, 200);
        let offset = filter.offset.unwrap_or(0).max(0);

        let rows: Vec<ExecutionRow> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM flowplane.workflow_execution
            WHERE tenant_id = $1
              AND ($2::UUID IS NULL OR definition_id = $2)
              AND ($3::TEXT IS NULL OR status = $3)
            ORDER BY started_at DESC
            LIMIT $4 OFFSET $5
            "#,
            EXECUTION_COLUMNS
        ))
        .bind(tenant_id)
        .bind(filter.definition_id)
        .bind(filter.status.map(|s| s.to_string()))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(map_execution).collect()
    }

    async fn transition_execution(
        &self,
        execution_id: Uuid,
        allowed_from: &[ExecutionStatus],
        change: ExecutionChange,
    ) -> AppResult<Transition> {
        let mut tx = self.pool.begin().await?;

        let row: Option<ExecutionRow> = sqlx::query_as(&format!(
            "SELECT {} FROM flowplane.workflow_execution WHERE id = $1 FOR UPDATE",
            EXECUTION_COLUMNS
        ))
        .bind(execution_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Ok(Transition::Missing);
        };
        let mut execution = map_execution(row)?;

        if !allowed_from.contains(&execution.status) {
            return Ok(Transition::Rejected {
                current: execution.status,
            });
        }

        change.apply(&mut execution);

        sqlx::query(
            r#"
            UPDATE flowplane.workflow_execution
            SET status = $2, progress_percentage = $3, current_step = $4,
                completed_at = $5, error_message = $6
            WHERE id = $1
            "#,
        )
        .bind(execution.id)
        .bind(execution.status.to_string())
        .bind(execution.progress_percentage)
        .bind(&execution.current_step)
        .bind(execution.completed_at)
        .bind(&execution.error_message)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(Transition::Applied(execution))
    }

    async fn count_executions_by_status(
        &self,
        tenant_id: Uuid,
    ) -> AppResult<Vec<(ExecutionStatus, i64)>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT status, COUNT(*) FROM flowplane.workflow_execution
            WHERE tenant_id = $1
            GROUP BY status
            ORDER BY status
            "#,
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(status, count)| {
                Ok((
                    status
                        .parse::<ExecutionStatus>()
                        .map_err(AppError::Internal)?,
                    count,
                ))
            })
            .collect()
    }

    async fn create_step_if_absent(
        &self,
        step: &WorkflowStepExecution,
    ) -> AppResult<WorkflowStepExecution> {
        let inserted: Option<StepRow> = sqlx::query_as(&format!(
            r#"
            INSERT INTO flowplane.workflow_step_execution (
                id, execution_id, step_id, step_name, step_type, status,
                input_data, output_data, started_at, completed_at, error_message
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            ON CONFLICT (execution_id, step_id) DO NOTHING
            RETURNING {}
            "#,
            STEP_COLUMNS
        ))
        .bind(step.id)
        .bind(step.execution_id)
        .bind(&step.step_id)
        .bind(&step.step_name)
        .bind(&step.step_type)
        .bind(step.status.to_string())
        .bind(&step.input_data)
        .bind(&step.output_data)
        .bind(step.started_at)
        .bind(step.completed_at)
        .bind(&step.error_message)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = inserted {
            return map_step(row);
        }

        // Conflict: return the existing record.
        let existing: StepRow = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM flowplane.workflow_step_execution
            WHERE execution_id = $1 AND step_id = $2
            "#,
            STEP_COLUMNS
        ))
        .bind(step.execution_id)
        .bind(&step.step_id)
        .fetch_one(&self.pool)
        .await?;

        map_step(existing)
    }

    async fn get_step(
        &self,
        step_execution_id: Uuid,
    ) -> AppResult<Option<WorkflowStepExecution>> {
        let row: Option<StepRow> = sqlx::query_as(&format!(
            "SELECT {} FROM flowplane.workflow_step_execution WHERE id = $1",
            STEP_COLUMNS
        ))
        .bind(step_execution_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(map_step).transpose()
    }

    async fn update_step(&self, step: &WorkflowStepExecution) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE flowplane.workflow_step_execution
            SET status = $2, input_data = $3, output_data = $4,
                started_at = $5, completed_at = $6, error_message = $7
            WHERE id = $1
            "#,
        )
        .bind(step.id)
        .bind(step.status.to_string())
        .bind(&step.input_data)
        .bind(&step.output_data)
        .bind(step.started_at)
        .bind(step.completed_at)
        .bind(&step.error_message)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_steps(&self, execution_id: Uuid) -> AppResult<Vec<WorkflowStepExecution>> {
        let rows: Vec<StepRow> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM flowplane.workflow_step_execution
            WHERE execution_id = $1
            ORDER BY started_at ASC
            "#,
            STEP_COLUMNS
        ))
        .bind(execution_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(map_step).collect()
    }

    async fn delete_steps(&self, execution_id: Uuid) -> AppResult<()> {
        sqlx::query("DELETE FROM flowplane.workflow_step_execution WHERE execution_id = $1")
            .bind(execution_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn count_steps_by_status(&self, execution_id: Uuid) -> AppResult<StepCounts> {
        let row: (i64, i64, i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*),
                COUNT(*) FILTER (WHERE status = 'running'),
                COUNT(*) FILTER (WHERE status = 'completed'),
                COUNT(*) FILTER (WHERE status = 'failed'),
                COUNT(*) FILTER (WHERE status = 'skipped')
            FROM flowplane.workflow_step_execution
            WHERE execution_id = $1
            "#,
        )
        .bind(execution_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(StepCounts {
            total: row.0,
            running: row.1,
            completed: row.2,
            failed: row.3,
            skipped: row.4,
        })
    }

    async fn insert_rule(&self, rule: &BusinessRule) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO flowplane.business_rule (
                id, tenant_id, name, entity_type, rule_type, priority, is_active,
                conditions, actions, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(rule.id)
        .bind(rule.tenant_id)
        .bind(&rule.name)
        .bind(&rule.entity_type)
        .bind(&rule.rule_type)
        .bind(rule.priority)
        .bind(rule.is_active)
        .bind(&rule.conditions)
        .bind(&rule.actions)
        .bind(rule.created_at)
        .bind(rule.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_rule(&self, rule: &BusinessRule) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE flowplane.business_rule
            SET name = $3, entity_type = $4, rule_type = $5, priority = $6,
                is_active = $7, conditions = $8, actions = $9, updated_at = $10
            WHERE id = $1 AND tenant_id = $2
            "#,
        )
        .bind(rule.id)
        .bind(rule.tenant_id)
        .bind(&rule.name)
        .bind(&rule.entity_type)
        .bind(&rule.rule_type)
        .bind(rule.priority)
        .bind(rule.is_active)
        .bind(&rule.conditions)
        .bind(&rule.actions)
        .bind(rule.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_rule(&self, tenant_id: Uuid, rule_id: Uuid) -> AppResult<bool> {
        let result = sqlx::query(
            "DELETE FROM flowplane.business_rule WHERE id = $1 AND tenant_id = $2",
        )
        .bind(rule_id)
        .bind(tenant_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn get_rule(&self, tenant_id: Uuid, rule_id: Uuid) -> AppResult<Option<BusinessRule>> {
        let row: Option<RuleRow> = sqlx::query_as(&format!(
            "SELECT {} FROM flowplane.business_rule WHERE id = $1 AND tenant_id = $2",
            RULE_COLUMNS
        ))
        .bind(rule_id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(map_rule))
    }

    async fn list_rules(
        &self,
        tenant_id: Uuid,
        entity_type: Option<&str>,
    ) -> AppResult<Vec<BusinessRule>> {
        let rows: Vec<RuleRow> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM flowplane.business_rule
            WHERE tenant_id = $1
              AND ($2::TEXT IS NULL OR entity_type = $2)
            ORDER BY priority DESC, id ASC
            "#,
            RULE_COLUMNS
        ))
        .bind(tenant_id)
        .bind(entity_type)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(map_rule).collect())
    }

    async fn active_rules_for_entity(
        &self,
        tenant_id: Uuid,
        entity_type: &str,
    ) -> AppResult<Vec<BusinessRule>> {
        let rows: Vec<RuleRow> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM flowplane.business_rule
            WHERE tenant_id = $1 AND entity_type = $2 AND is_active
            ORDER BY priority DESC, id ASC
            "#,
            RULE_COLUMNS
        ))
        .bind(tenant_id)
        .bind(entity_type)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(map_rule).collect())
    }

    async fn insert_rule_execution(&self, record: &RuleExecution) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO flowplane.rule_execution (
                id, tenant_id, rule_id, entity_id, entity_type, trigger_event,
                input_data, status, output_data, error_message, duration_ms, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(record.id)
        .bind(record.tenant_id)
        .bind(record.rule_id)
        .bind(&record.entity_id)
        .bind(&record.entity_type)
        .bind(&record.trigger_event)
        .bind(&record.input_data)
        .bind(record.status.to_string())
        .bind(&record.output_data)
        .bind(&record.error_message)
        .bind(record.duration_ms)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_rule_executions(
        &self,
        tenant_id: Uuid,
        rule_id: Option<Uuid>,
        limit: i64,
    ) -> AppResult<Vec<RuleExecution>> {
        let rows: Vec<RuleExecutionRow> = sqlx::query_as(&format!(
            r#"
            SELECT {} FROM flowplane.rule_execution
            WHERE tenant_id = $1
              AND ($2::UUID IS NULL OR rule_id = $2)
            ORDER BY created_at DESC
            LIMIT $3
            "#,
            RULE_EXECUTION_COLUMNS
        ))
        .bind(tenant_id)
        .bind(rule_id)
        .bind(limit.clamp(1, 500))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(map_rule_execution).collect()
    }

    async fn count_rule_executions_by_status(
        &self,
        tenant_id: Uuid,
    ) -> AppResult<Vec<(RuleExecutionStatus, i64)>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(
            r#"
            SELECT status, COUNT(*) FROM flowplane.rule_execution
            WHERE tenant_id = $1
            GROUP BY status
            ORDER BY status
            "#,
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(status, count)| {
                Ok((
                    status
                        .parse::<RuleExecutionStatus>()
                        .map_err(AppError::Internal)?,
                    count,
                ))
            })
            .collect()
    }
}
