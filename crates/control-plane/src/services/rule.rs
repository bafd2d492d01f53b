//! Business rule CRUD service.
//!
//! Create and update validate the condition/action shape up front with
//! the full violation list, so malformed rules are rejected before they
//! can reach the evaluation path.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult, ValidationErrors};
use crate::model::{BusinessRule, RuleExecution};
use crate::rules::action::{check_action_shape, ActionDef};
use crate::rules::condition::{ConditionOperator, ConditionTree};
use crate::storage::Store;

/// Request to create a rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRuleRequest {
    pub name: String,
    pub entity_type: String,
    #[serde(default = "default_rule_type")]
    pub rule_type: String,
    #[serde(default)]
    pub priority: i32,
    pub conditions: serde_json::Value,
    pub actions: serde_json::Value,
}

fn default_rule_type() -> String {
    "automation".to_string()
}

/// Request to update a rule.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateRuleRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub entity_type: Option<String>,
    #[serde(default)]
    pub rule_type: Option<String>,
    #[serde(default)]
    pub priority: Option<i32>,
    #[serde(default)]
    pub conditions: Option<serde_json::Value>,
    #[serde(default)]
    pub actions: Option<serde_json::Value>,
}

/// Validate the static shape of a rule: parsable condition tree with
/// known operators, parsable action list with known types and required
/// fields. Returns every violation found.
pub fn validate_rule_shape(
    name: &str,
    conditions: &serde_json::Value,
    actions: &serde_json::Value,
) -> ValidationErrors {
    let mut errors = ValidationErrors::new();

    if name.trim().is_empty() {
        errors.push("rule name must not be empty");
    }

    match serde_json::from_value::<ConditionTree>(conditions.clone()) {
        Ok(tree) => {
            for (index, condition) in tree.conditions().iter().enumerate() {
                if condition.field.trim().is_empty() {
                    errors.push(format!("conditions[{}] has an empty field", index));
                }
                if let Err(e) = ConditionOperator::parse(&condition.operator) {
                    errors.push(format!("conditions[{}]: {}", index, e));
                }
            }
        }
        Err(e) => errors.push(format!("conditions are malformed: {}", e)),
    }

    match serde_json::from_value::<Vec<ActionDef>>(actions.clone()) {
        Ok(actions) => {
            for (index, action) in actions.iter().enumerate() {
                if let Err(e) = check_action_shape(action) {
                    errors.push(format!("actions[{}]: {}", index, e));
                }
            }
        }
        Err(e) => errors.push(format!("actions are malformed: {}", e)),
    }

    errors
}

/// Service for business rule operations.
pub struct RuleService {
    store: Arc<dyn Store>,
}

impl RuleService {
    /// Create a new rule service.
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Create a rule after shape validation.
    pub async fn create(
        &self,
        tenant_id: Uuid,
        request: CreateRuleRequest,
    ) -> AppResult<BusinessRule> {
        validate_rule_shape(&request.name, &request.conditions, &request.actions)
            .into_result()?;

        let rule = BusinessRule::new(
            tenant_id,
            &request.name,
            &request.entity_type,
            &request.rule_type,
            request.priority,
            request.conditions,
            request.actions,
        );
        self.store.insert_rule(&rule).await?;

        tracing::info!(rule_id = %rule.id, name = %rule.name, "Business rule created");

        Ok(rule)
    }

    /// Update a rule after shape validation of the merged result.
    pub async fn update(
        &self,
        tenant_id: Uuid,
        rule_id: Uuid,
        request: UpdateRuleRequest,
    ) -> AppResult<BusinessRule> {
        let mut rule = self.require(tenant_id, rule_id).await?;

        if let Some(name) = request.name {
            rule.name = name;
        }
        if let Some(entity_type) = request.entity_type {
            rule.entity_type = entity_type;
        }
        if let Some(rule_type) = request.rule_type {
            rule.rule_type = rule_type;
        }
        if let Some(priority) = request.priority {
            rule.priority = priority;
        }
        if let Some(conditions) = request.conditions {
            rule.conditions = conditions;
        }
        if let Some(actions) = request.actions {
            rule.actions = actions;
        }

        validate_rule_shape(&rule.name, &rule.conditions, &rule.actions).into_result()?;
        rule.updated_at = Utc::now();

        self.store.update_rule(&rule).await?;
        Ok(rule)
    }

    /// Toggle a rule's participation in evaluation.
    pub async fn toggle(
        &self,
        tenant_id: Uuid,
        rule_id: Uuid,
        is_active: bool,
    ) -> AppResult<BusinessRule> {
        let mut rule = self.require(tenant_id, rule_id).await?;
        rule.is_active = is_active;
        rule.updated_at = Utc::now();
        self.store.update_rule(&rule).await?;
        Ok(rule)
    }

    /// Delete a rule.
    pub async fn delete(&self, tenant_id: Uuid, rule_id: Uuid) -> AppResult<()> {
        if !self.store.delete_rule(tenant_id, rule_id).await? {
            return Err(AppError::NotFound(format!(
                "Business rule not found: {}",
                rule_id
            )));
        }
        Ok(())
    }

    /// Fetch a rule.
    pub async fn get(&self, tenant_id: Uuid, rule_id: Uuid) -> AppResult<BusinessRule> {
        self.require(tenant_id, rule_id).await
    }

    /// List rules, optionally by entity type.
    pub async fn list(
        &self,
        tenant_id: Uuid,
        entity_type: Option<&str>,
    ) -> AppResult<Vec<BusinessRule>> {
        self.store.list_rules(tenant_id, entity_type).await
    }

    /// Recent rule execution history.
    pub async fn execution_history(
        &self,
        tenant_id: Uuid,
        rule_id: Option<Uuid>,
        limit: i64,
    ) -> AppResult<Vec<RuleExecution>> {
        self.store
            .list_rule_executions(tenant_id, rule_id, limit)
            .await
    }

    async fn require(&self, tenant_id: Uuid, rule_id: Uuid) -> AppResult<BusinessRule> {
        self.store
            .get_rule(tenant_id, rule_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Business rule not found: {}", rule_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use serde_json::json;

    fn service() -> (RuleService, Uuid) {
        (RuleService::new(Arc::new(MemoryStore::new())), Uuid::new_v4())
    }

    fn request() -> CreateRuleRequest {
        CreateRuleRequest {
            name: "large_deal_alert".to_string(),
            entity_type: "deal".to_string(),
            rule_type: "automation".to_string(),
            priority: 10,
            conditions: json!({"field": "amount", "operator": "greater_than", "value": 1000}),
            actions: json!([
                {"type": "send_notification", "recipient": "mgr@x", "message": "large deal"}
            ]),
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let (service, tenant) = service();
        let rule = service.create(tenant, request()).await.unwrap();
        let fetched = service.get(tenant, rule.id).await.unwrap();
        assert_eq!(fetched.name, "large_deal_alert");
        assert!(fetched.is_active);
    }

    #[tokio::test]
    async fn test_create_reports_all_shape_violations() {
        let (service, tenant) = service();
        let mut bad = request();
        bad.conditions = json!({"field": "amount", "operator": "fuzzy_match", "value": 1});
        bad.actions = json!([
            {"type": "send_email", "recipient": "a@b.c"},
            {"type": "teleport"}
        ]);

        let err = service.create(tenant, bad).await.unwrap_err();
        let AppError::Validation(errors) = err else {
            panic!("expected validation error");
        };
        assert_eq!(errors.len(), 3);
        assert!(errors.violations()[0].contains("fuzzy_match"));
        assert!(errors.violations()[1].contains("subject"));
        assert!(errors.violations()[2].contains("teleport"));
    }

    #[tokio::test]
    async fn test_update_validates_merged_shape() {
        let (service, tenant) = service();
        let rule = service.create(tenant, request()).await.unwrap();

        let err = service
            .update(
                tenant,
                rule.id,
                UpdateRuleRequest {
                    conditions: Some(json!({"field": "x", "operator": "nope"})),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        // The stored rule is unchanged.
        let stored = service.get(tenant, rule.id).await.unwrap();
        assert_eq!(
            stored.conditions,
            json!({"field": "amount", "operator": "greater_than", "value": 1000})
        );
    }

    #[tokio::test]
    async fn test_toggle_and_delete() {
        let (service, tenant) = service();
        let rule = service.create(tenant, request()).await.unwrap();

        let toggled = service.toggle(tenant, rule.id, false).await.unwrap();
        assert!(!toggled.is_active);

        service.delete(tenant, rule.id).await.unwrap();
        let err = service.get(tenant, rule.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_other_tenants_rule_is_not_found() {
        let (service, tenant) = service();
        let rule = service.create(tenant, request()).await.unwrap();

        let err = service.delete(Uuid::new_v4(), rule.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        // Still present for the owner.
        assert!(service.get(tenant, rule.id).await.is_ok());
    }
}
