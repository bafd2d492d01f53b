//! Business rule and rule execution models.
//!
//! A rule is a tenant-owned condition tree plus an ordered action list,
//! evaluated against an entity whenever a trigger event fires. Every
//! evaluation leaves one immutable RuleExecution audit record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A tenant-owned condition/action rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessRule {
    /// Unique rule ID
    pub id: Uuid,

    /// Owning tenant
    pub tenant_id: Uuid,

    /// Rule name
    pub name: String,

    /// Entity type the rule applies to (deal, contact, ticket, ...)
    pub entity_type: String,

    /// Rule classification (automation, validation, scoring, ...)
    pub rule_type: String,

    /// Evaluation priority; higher runs first, ties break by rule id
    pub priority: i32,

    /// Whether the rule participates in evaluation
    pub is_active: bool,

    /// Condition tree: a single condition object or an implicit-AND array
    pub conditions: serde_json::Value,

    /// Ordered action list
    pub actions: serde_json::Value,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl BusinessRule {
    /// Create a new active rule.
    pub fn new(
        tenant_id: Uuid,
        name: &str,
        entity_type: &str,
        rule_type: &str,
        priority: i32,
        conditions: serde_json::Value,
        actions: serde_json::Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            name: name.to_string(),
            entity_type: entity_type.to_string(),
            rule_type: rule_type.to_string(),
            priority,
            is_active: true,
            conditions,
            actions,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Outcome of one rule evaluation for one trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleExecutionStatus {
    /// Conditions matched and all actions were issued.
    Completed,
    /// Conditions did not match; no action attempted.
    Skipped,
    /// Evaluation or an action failed.
    Failed,
}

impl std::fmt::Display for RuleExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Skipped => write!(f, "skipped"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for RuleExecutionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "completed" => Ok(Self::Completed),
            "skipped" => Ok(Self::Skipped),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown rule execution status: {}", other)),
        }
    }
}

/// Immutable audit record: one rule, one trigger invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleExecution {
    /// Unique record ID
    pub id: Uuid,

    /// Owning tenant
    pub tenant_id: Uuid,

    /// The evaluated rule
    pub rule_id: Uuid,

    /// Entity the trigger concerned
    pub entity_id: String,

    /// Entity type at trigger time
    pub entity_type: String,

    /// Trigger event name (created, updated, stage_changed, ...)
    pub trigger_event: String,

    /// Record snapshot the rule was evaluated against
    pub input_data: serde_json::Value,

    /// Evaluation outcome
    pub status: RuleExecutionStatus,

    /// Action results when status is completed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_data: Option<serde_json::Value>,

    /// Failure message when status is failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Total evaluation plus action time in milliseconds
    pub duration_ms: i64,

    /// Record timestamp
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_execution_status_round_trip() {
        for status in [
            RuleExecutionStatus::Completed,
            RuleExecutionStatus::Skipped,
            RuleExecutionStatus::Failed,
        ] {
            let parsed: RuleExecutionStatus = status.to_string().parse().unwrap();
            assert_eq!(parsed, status);
        }
    }

    #[test]
    fn test_new_rule_is_active() {
        let rule = BusinessRule::new(
            Uuid::new_v4(),
            "large_deal_alert",
            "deal",
            "automation",
            10,
            serde_json::json!({"field": "amount", "operator": "greater_than", "value": 1000}),
            serde_json::json!([]),
        );
        assert!(rule.is_active);
        assert_eq!(rule.entity_type, "deal");
    }
}
