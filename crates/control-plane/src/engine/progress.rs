//! Execution progress rollup.
//!
//! Invoked by the step tracker after every step transition on behalf of
//! the execution coordinator: recomputes the progress percentage,
//! persists the current step, and rolls step outcomes up into the
//! execution status. Any failed step fails the execution; the execution
//! completes when a terminal graph step (an end event, or a step with no
//! outgoing connections) has completed and nothing is still running.
//! Terminal executions are left untouched, so late or duplicate step
//! callbacks cannot reopen them.

use std::collections::HashSet;

use chrono::Utc;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::events::{EventBus, EXECUTIONS_SUBJECT};
use crate::model::{
    ExecutionStatus, StepCounts, StepStatus, WorkflowExecution, WorkflowStepExecution,
};
use crate::storage::store::{ExecutionChange, Store, Transition};

/// Statuses a progress update may be applied from.
const NON_TERMINAL: [ExecutionStatus; 3] = [
    ExecutionStatus::Pending,
    ExecutionStatus::Running,
    ExecutionStatus::Suspended,
];

/// `floor(100 * (completed + skipped) / total)` over the recorded step
/// executions; zero when no steps exist yet.
pub fn compute_progress(counts: &StepCounts) -> i32 {
    if counts.total <= 0 {
        return 0;
    }
    (100 * (counts.completed + counts.skipped) / counts.total) as i32
}

/// Recompute progress and roll up terminal state for an execution.
///
/// Returns the updated execution, or `None` when the execution is already
/// terminal (the update is dropped, not an error).
pub async fn refresh(
    store: &dyn Store,
    events: &EventBus,
    execution_id: Uuid,
) -> AppResult<Option<WorkflowExecution>> {
    let Some(execution) = store.get_execution_any(execution_id).await? else {
        return Err(AppError::NotFound(format!(
            "Execution not found: {}",
            execution_id
        )));
    };

    if execution.status.is_terminal() {
        tracing::debug!(
            execution_id = %execution_id,
            status = %execution.status,
            "Dropping progress update for terminal execution"
        );
        return Ok(None);
    }

    let Some(definition) = store
        .get_definition(execution.tenant_id, execution.definition_id)
        .await?
    else {
        return Err(AppError::NotFound(format!(
            "Workflow definition not found: {}",
            execution.definition_id
        )));
    };

    let counts = store.count_steps_by_status(execution_id).await?;
    let progress = compute_progress(&counts);
    let steps = store.list_steps(execution_id).await?;
    let current_step = steps
        .iter()
        .rev()
        .find(|s| s.status == StepStatus::Running)
        .map(|s| s.step_id.clone());

    let (change, event_type) = if counts.failed > 0 {
        let error = steps
            .iter()
            .find(|s| s.status == StepStatus::Failed)
            .map(|s| {
                format!(
                    "step '{}' failed: {}",
                    s.step_id,
                    s.error_message.as_deref().unwrap_or("no error message")
                )
            })
            .unwrap_or_else(|| "step failed".to_string());

        (
            ExecutionChange {
                status: Some(ExecutionStatus::Failed),
                progress_percentage: Some(progress),
                current_step: Some(current_step),
                completed_at: Some(Some(Utc::now())),
                error_message: Some(Some(error)),
            },
            "execution.failed",
        )
    } else if counts.running == 0 && end_reached(&definition.graph, &steps) {
        (
            ExecutionChange {
                status: Some(ExecutionStatus::Completed),
                progress_percentage: Some(progress),
                current_step: Some(None),
                completed_at: Some(Some(Utc::now())),
                error_message: None,
            },
            "execution.completed",
        )
    } else {
        (
            ExecutionChange {
                status: None,
                progress_percentage: Some(progress),
                current_step: Some(current_step),
                completed_at: None,
                error_message: None,
            },
            "execution.progress",
        )
    };

    match store
        .transition_execution(execution_id, &NON_TERMINAL, change)
        .await?
    {
        Transition::Applied(updated) => {
            events
                .emit(
                    EXECUTIONS_SUBJECT,
                    event_type,
                    serde_json::json!({
                        "execution_id": updated.id,
                        "tenant_id": updated.tenant_id,
                        "execution_key": updated.execution_key,
                        "status": updated.status,
                        "progress_percentage": updated.progress_percentage,
                        "current_step": updated.current_step,
                    }),
                )
                .await;
            Ok(Some(updated))
        }
        // Lost the race against a terminal transition; the stored status
        // wins.
        Transition::Rejected { .. } => Ok(None),
        Transition::Missing => Err(AppError::NotFound(format!(
            "Execution not found: {}",
            execution_id
        ))),
    }
}

/// Whether a terminal graph step has completed. Terminal steps are the
/// end events plus any step without outgoing connections.
fn end_reached(
    graph: &crate::definition::graph::WorkflowGraph,
    steps: &[WorkflowStepExecution],
) -> bool {
    let mut terminal_ids: HashSet<&str> = graph.end_steps().into_iter().collect();
    for step in &graph.steps {
        if graph.successors(&step.id).is_empty() {
            terminal_ids.insert(step.id.as_str());
        }
    }

    steps
        .iter()
        .any(|s| s.status == StepStatus::Completed && terminal_ids.contains(s.step_id.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::graph::{Connection, StepDef, StepType, WorkflowGraph};
    use std::collections::HashMap;

    fn counts(total: i64, completed: i64, skipped: i64, failed: i64) -> StepCounts {
        StepCounts {
            total,
            running: total - completed - skipped - failed,
            completed,
            failed,
            skipped,
        }
    }

    fn step_record(step_id: &str, status: StepStatus) -> WorkflowStepExecution {
        let mut record =
            WorkflowStepExecution::new(Uuid::new_v4(), step_id, step_id, "service");
        record.status = status;
        record
    }

    fn graph() -> WorkflowGraph {
        let step = |id: &str, step_type: StepType, config: serde_json::Value| StepDef {
            id: id.to_string(),
            name: id.to_string(),
            step_type,
            config: match config {
                serde_json::Value::Object(map) => map.into_iter().collect(),
                _ => HashMap::new(),
            },
        };
        WorkflowGraph {
            steps: vec![
                step("start", StepType::Event, serde_json::json!({"event_kind": "start"})),
                step("work", StepType::Service, serde_json::json!({})),
                step("end", StepType::Event, serde_json::json!({"event_kind": "end"})),
            ],
            connections: vec![
                Connection {
                    from: "start".to_string(),
                    to: "work".to_string(),
                    condition: None,
                },
                Connection {
                    from: "work".to_string(),
                    to: "end".to_string(),
                    condition: None,
                },
            ],
            variables: vec![],
        }
    }

    #[test]
    fn test_progress_is_floored() {
        assert_eq!(compute_progress(&counts(3, 1, 0, 0)), 33);
        assert_eq!(compute_progress(&counts(3, 2, 0, 0)), 66);
        assert_eq!(compute_progress(&counts(3, 3, 0, 0)), 100);
    }

    #[test]
    fn test_progress_counts_skipped_steps() {
        assert_eq!(compute_progress(&counts(4, 2, 1, 0)), 75);
        assert_eq!(compute_progress(&counts(2, 0, 2, 0)), 100);
    }

    #[test]
    fn test_progress_with_no_steps_is_zero() {
        assert_eq!(compute_progress(&counts(0, 0, 0, 0)), 0);
    }

    #[test]
    fn test_failed_steps_do_not_count_toward_progress() {
        assert_eq!(compute_progress(&counts(3, 1, 0, 1)), 33);
    }

    #[test]
    fn test_end_reached_only_for_terminal_steps() {
        let graph = graph();

        // A completed intermediate step does not finish the run.
        assert!(!end_reached(&graph, &[step_record("work", StepStatus::Completed)]));

        // The completed end event does.
        assert!(end_reached(&graph, &[step_record("end", StepStatus::Completed)]));

        // A running end event does not.
        assert!(!end_reached(&graph, &[step_record("end", StepStatus::Running)]));
    }

    #[test]
    fn test_steps_without_successors_count_as_terminal() {
        let mut graph = graph();
        // Disconnect 'work' from 'end': 'work' becomes a dead-end step.
        graph.connections.pop();
        assert!(end_reached(&graph, &[step_record("work", StepStatus::Completed)]));
    }
}
