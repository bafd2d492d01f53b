//! Rule coordination.
//!
//! Fires the active rules for an entity trigger event in priority order,
//! recording one RuleExecution per rule per trigger. One rule's failure
//! never blocks evaluation of the remaining rules.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use uuid::Uuid;

use crate::dispatch::{RecordingDispatcher, SideEffectDispatcher};
use crate::error::{AppError, AppResult};
use crate::events::{EventBus, RULES_SUBJECT};
use crate::model::{BusinessRule, RuleExecution, RuleExecutionStatus};
use crate::rules::action::{ActionDef, ActionExecutor, ActionResult};
use crate::rules::condition::{ConditionEvaluator, ConditionTree};
use crate::storage::Store;

/// Outcome of a rule dry-run.
#[derive(Debug, Clone)]
pub struct RuleTestOutcome {
    /// Whether the conditions matched the sample data.
    pub matched: bool,
    /// Action results when the conditions matched.
    pub results: Vec<ActionResult>,
}

enum RuleOutcome {
    Completed(Vec<ActionResult>),
    Skipped,
}

/// Looks up, evaluates and records business rules for entity events.
pub struct RuleCoordinator {
    store: Arc<dyn Store>,
    events: EventBus,
    evaluator: ConditionEvaluator,
    executor: ActionExecutor,
}

impl RuleCoordinator {
    /// Create a new rule coordinator; actions dispatch through the given
    /// dispatcher.
    pub fn new(
        store: Arc<dyn Store>,
        events: EventBus,
        dispatcher: Arc<dyn SideEffectDispatcher>,
    ) -> Self {
        Self {
            store,
            events,
            evaluator: ConditionEvaluator::new(),
            executor: ActionExecutor::new(dispatcher),
        }
    }

    /// Evaluate every active rule for `(tenant, entity type)` against the
    /// record, in priority order, recording one audit entry per rule.
    pub async fn fire_rules(
        &self,
        tenant_id: Uuid,
        entity_type: &str,
        entity_id: &str,
        trigger_event: &str,
        record: &serde_json::Value,
    ) -> AppResult<Vec<RuleExecution>> {
        let rules = self
            .store
            .active_rules_for_entity(tenant_id, entity_type)
            .await?;

        tracing::debug!(
            tenant_id = %tenant_id,
            entity_type = %entity_type,
            trigger_event = %trigger_event,
            rule_count = rules.len(),
            "Firing rules"
        );

        let mut records = Vec::with_capacity(rules.len());

        for rule in &rules {
            let started = Instant::now();
            let outcome = self
                .run_rule(rule, entity_type, entity_id, record, &self.executor)
                .await;
            let duration_ms = started.elapsed().as_millis() as i64;

            let audit = match outcome {
                Ok(RuleOutcome::Completed(results)) => RuleExecution {
                    id: Uuid::new_v4(),
                    tenant_id,
                    rule_id: rule.id,
                    entity_id: entity_id.to_string(),
                    entity_type: entity_type.to_string(),
                    trigger_event: trigger_event.to_string(),
                    input_data: record.clone(),
                    status: RuleExecutionStatus::Completed,
                    output_data: Some(serde_json::to_value(&results)?),
                    error_message: None,
                    duration_ms,
                    created_at: Utc::now(),
                },
                Ok(RuleOutcome::Skipped) => RuleExecution {
                    id: Uuid::new_v4(),
                    tenant_id,
                    rule_id: rule.id,
                    entity_id: entity_id.to_string(),
                    entity_type: entity_type.to_string(),
                    trigger_event: trigger_event.to_string(),
                    input_data: record.clone(),
                    status: RuleExecutionStatus::Skipped,
                    output_data: None,
                    error_message: None,
                    duration_ms,
                    created_at: Utc::now(),
                },
                Err(e) => {
                    // Isolated per rule: record the failure and move on.
                    tracing::warn!(
                        rule_id = %rule.id,
                        rule_name = %rule.name,
                        error = %e,
                        "Rule execution failed"
                    );
                    RuleExecution {
                        id: Uuid::new_v4(),
                        tenant_id,
                        rule_id: rule.id,
                        entity_id: entity_id.to_string(),
                        entity_type: entity_type.to_string(),
                        trigger_event: trigger_event.to_string(),
                        input_data: record.clone(),
                        status: RuleExecutionStatus::Failed,
                        output_data: None,
                        error_message: Some(e.to_string()),
                        duration_ms,
                        created_at: Utc::now(),
                    }
                }
            };

            self.store.insert_rule_execution(&audit).await?;

            self.events
                .emit(
                    RULES_SUBJECT,
                    "rule.executed",
                    serde_json::json!({
                        "tenant_id": tenant_id,
                        "rule_id": rule.id,
                        "entity_type": entity_type,
                        "entity_id": entity_id,
                        "trigger_event": trigger_event,
                        "status": audit.status,
                        "duration_ms": audit.duration_ms,
                    }),
                )
                .await;

            records.push(audit);
        }

        Ok(records)
    }

    /// Dry-run a rule against sample data: same evaluate/execute path,
    /// recording dispatcher, no audit history.
    pub async fn test_rule(
        &self,
        rule: &BusinessRule,
        sample_data: &serde_json::Value,
    ) -> AppResult<RuleTestOutcome> {
        let dispatcher = Arc::new(RecordingDispatcher::new());
        let executor = ActionExecutor::new(dispatcher);

        match self
            .run_rule(rule, &rule.entity_type, "sample", sample_data, &executor)
            .await?
        {
            RuleOutcome::Completed(results) => Ok(RuleTestOutcome {
                matched: true,
                results,
            }),
            RuleOutcome::Skipped => Ok(RuleTestOutcome {
                matched: false,
                results: vec![],
            }),
        }
    }

    /// Evaluate one rule and, on a match, execute its actions.
    async fn run_rule(
        &self,
        rule: &BusinessRule,
        entity_type: &str,
        entity_id: &str,
        record: &serde_json::Value,
        executor: &ActionExecutor,
    ) -> AppResult<RuleOutcome> {
        let conditions: ConditionTree =
            serde_json::from_value(rule.conditions.clone()).map_err(|e| {
                AppError::Evaluation(format!(
                    "rule '{}' has malformed conditions: {}",
                    rule.name, e
                ))
            })?;

        if !self.evaluator.evaluate(&conditions, record)? {
            return Ok(RuleOutcome::Skipped);
        }

        let actions: Vec<ActionDef> = serde_json::from_value(rule.actions.clone()).map_err(|e| {
            AppError::Evaluation(format!("rule '{}' has malformed actions: {}", rule.name, e))
        })?;

        let results = executor
            .execute(rule.tenant_id, entity_type, entity_id, &actions, record)
            .await?;

        Ok(RuleOutcome::Completed(results))
    }
}
