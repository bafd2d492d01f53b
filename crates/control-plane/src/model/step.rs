//! Workflow step execution model.
//!
//! Step executions are created lazily as the process backend reaches each
//! graph node, and cascade with their owning execution.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of a single step execution: `(none) → RUNNING → {COMPLETED,
/// FAILED, SKIPPED}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Running,
    Completed,
    Failed,
    Skipped,
}

impl StepStatus {
    /// Whether the step has finished (successfully or not).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Skipped)
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

impl std::str::FromStr for StepStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "skipped" => Ok(Self::Skipped),
            other => Err(format!("unknown step status: {}", other)),
        }
    }
}

/// Run-time record of one graph node being reached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStepExecution {
    /// Unique step execution ID
    pub id: Uuid,

    /// Owning execution
    pub execution_id: Uuid,

    /// Graph step id, unique per execution
    pub step_id: String,

    /// Display name of the step
    pub step_name: String,

    /// Step type tag (service, user, script, ...)
    pub step_type: String,

    /// Step status
    pub status: StepStatus,

    /// Input handed to the step
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_data: Option<serde_json::Value>,

    /// Output produced by the step
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_data: Option<serde_json::Value>,

    /// Start timestamp
    pub started_at: DateTime<Utc>,

    /// Completion timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    /// Failure message when status is FAILED
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl WorkflowStepExecution {
    /// Create a new RUNNING step execution.
    pub fn new(execution_id: Uuid, step_id: &str, step_name: &str, step_type: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            execution_id,
            step_id: step_id.to_string(),
            step_name: step_name.to_string(),
            step_type: step_type.to_string(),
            status: StepStatus::Running,
            input_data: None,
            output_data: None,
            started_at: Utc::now(),
            completed_at: None,
            error_message: None,
        }
    }
}

/// Step counts by status for one execution, the input to progress rollup.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct StepCounts {
    pub total: i64,
    pub running: i64,
    pub completed: i64,
    pub failed: i64,
    pub skipped: i64,
}
