//! Workflow execution model and lifecycle state machine.
//!
//! One execution represents one run of one definition version. Status
//! transitions are driven exclusively through the execution coordinator;
//! the persisted status is the single source of truth for racing
//! suspend/cancel requests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a workflow execution.
///
/// `PENDING → RUNNING → {COMPLETED, FAILED}`, with
/// `RUNNING ↔ SUSPENDED`, `{PENDING, RUNNING, SUSPENDED} → CANCELLED`
/// and `FAILED → PENDING` via explicit retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Created, backend start not yet acknowledged.
    Pending,
    /// Backend acknowledged; steps are advancing.
    Running,
    /// Paused; resumable.
    Suspended,
    /// All steps completed or skipped.
    Completed,
    /// A step or the backend failed; recoverable via retry.
    Failed,
    /// Cancelled by the caller.
    Cancelled,
}

impl ExecutionStatus {
    /// Terminal statuses accept no further transitions (retry excepted
    /// for FAILED).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Whether a cancel request is legal from this status.
    pub fn can_cancel(&self) -> bool {
        matches!(self, Self::Pending | Self::Running | Self::Suspended)
    }

    /// Whether a suspend request is legal from this status.
    pub fn can_suspend(&self) -> bool {
        matches!(self, Self::Running)
    }

    /// Whether a resume request is legal from this status.
    pub fn can_resume(&self) -> bool {
        matches!(self, Self::Suspended)
    }

    /// Whether a retry request is legal from this status.
    pub fn can_retry(&self) -> bool {
        matches!(self, Self::Failed)
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Suspended => write!(f, "suspended"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for ExecutionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "suspended" => Ok(Self::Suspended),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" | "canceled" => Ok(Self::Cancelled),
            other => Err(format!("unknown execution status: {}", other)),
        }
    }
}

/// One run of one workflow definition version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowExecution {
    /// Unique execution ID
    pub id: Uuid,

    /// Owning tenant
    pub tenant_id: Uuid,

    /// The definition version this execution runs
    pub definition_id: Uuid,

    /// Unique business key derived from tenant, definition and start time
    pub execution_key: String,

    /// Lifecycle status
    pub status: ExecutionStatus,

    /// What started this execution (manual, entity_event, scheduled)
    pub trigger_type: String,

    /// Payload of the triggering event
    pub trigger_data: serde_json::Value,

    /// Execution variables handed to the process backend
    pub variables: serde_json::Value,

    /// Step currently advancing, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_step: Option<String>,

    /// `floor(100 * (completed + skipped) / total)` over step executions
    pub progress_percentage: i32,

    /// Start timestamp
    pub started_at: DateTime<Utc>,

    /// Completion timestamp, set on reaching a terminal status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    /// Failure message when status is FAILED
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl WorkflowExecution {
    /// Create a new PENDING execution.
    pub fn new(
        tenant_id: Uuid,
        definition_id: Uuid,
        trigger_type: &str,
        trigger_data: serde_json::Value,
        variables: serde_json::Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            definition_id,
            execution_key: generate_execution_key(&tenant_id, &definition_id, now),
            status: ExecutionStatus::Pending,
            trigger_type: trigger_type.to_string(),
            trigger_data,
            variables,
            current_step: None,
            progress_percentage: 0,
            started_at: now,
            completed_at: None,
            error_message: None,
        }
    }
}

/// Generate a collision-resistant execution key.
///
/// The key embeds the tenant, the definition and the start timestamp and
/// carries a random suffix so concurrent starts of the same definition in
/// the same millisecond still receive distinct keys.
pub fn generate_execution_key(
    tenant_id: &Uuid,
    definition_id: &Uuid,
    started_at: DateTime<Utc>,
) -> String {
    let tenant = tenant_id.simple().to_string();
    let definition = definition_id.simple().to_string();
    let suffix: u32 = rand::random::<u32>() & 0xff_ffff;
    format!(
        "{}-{}-{}-{:06x}",
        &tenant[..8],
        &definition[..8],
        started_at.format("%Y%m%d%H%M%S%3f"),
        suffix
    )
}

/// Filter for listing executions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionFilter {
    pub status: Option<ExecutionStatus>,
    pub definition_id: Option<Uuid>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        assert!(ExecutionStatus::Completed.is_terminal());
        assert!(ExecutionStatus::Failed.is_terminal());
        assert!(ExecutionStatus::Cancelled.is_terminal());
        assert!(!ExecutionStatus::Pending.is_terminal());
        assert!(!ExecutionStatus::Running.is_terminal());
        assert!(!ExecutionStatus::Suspended.is_terminal());
    }

    #[test]
    fn test_transition_predicates() {
        assert!(ExecutionStatus::Pending.can_cancel());
        assert!(ExecutionStatus::Running.can_cancel());
        assert!(ExecutionStatus::Suspended.can_cancel());
        assert!(!ExecutionStatus::Completed.can_cancel());

        assert!(ExecutionStatus::Running.can_suspend());
        assert!(!ExecutionStatus::Pending.can_suspend());

        assert!(ExecutionStatus::Suspended.can_resume());
        assert!(!ExecutionStatus::Running.can_resume());

        assert!(ExecutionStatus::Failed.can_retry());
        assert!(!ExecutionStatus::Cancelled.can_retry());
        assert!(!ExecutionStatus::Completed.can_retry());
    }

    #[test]
    fn test_status_round_trip() {
        for status in [
            ExecutionStatus::Pending,
            ExecutionStatus::Running,
            ExecutionStatus::Suspended,
            ExecutionStatus::Completed,
            ExecutionStatus::Failed,
            ExecutionStatus::Cancelled,
        ] {
            let parsed: ExecutionStatus = status.to_string().parse().unwrap();
            assert_eq!(parsed, status);
        }
        assert!("bogus".parse::<ExecutionStatus>().is_err());
    }

    #[test]
    fn test_new_execution_defaults() {
        let execution = WorkflowExecution::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "manual",
            serde_json::json!({}),
            serde_json::json!({}),
        );
        assert_eq!(execution.status, ExecutionStatus::Pending);
        assert_eq!(execution.progress_percentage, 0);
        assert!(execution.completed_at.is_none());
        assert!(execution.error_message.is_none());
    }

    #[test]
    fn test_execution_keys_are_unique() {
        let tenant = Uuid::new_v4();
        let definition = Uuid::new_v4();
        let now = Utc::now();
        let a = generate_execution_key(&tenant, &definition, now);
        let b = generate_execution_key(&tenant, &definition, now);
        assert_ne!(a, b);
        assert!(a.starts_with(&tenant.simple().to_string()[..8]));
    }
}
