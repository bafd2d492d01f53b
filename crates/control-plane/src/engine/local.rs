//! In-process backend for tests and the local CLI runtime.
//!
//! Drives an execution sequentially through its graph on a spawned task,
//! recording step lifecycles through the step tracker. Before every step
//! advance it re-reads the persisted execution status and aborts silently
//! unless it is still RUNNING, which is how suspend/cancel races resolve.
//!
//! Step bodies are simulated, not executed: a step whose config carries
//! `"simulate": "fail"` (or `"skip"`) fails (or skips), everything else
//! completes; `"delay_ms"` stretches a step out. Connection guard
//! conditions are not evaluated.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;
use uuid::Uuid;

use crate::definition::graph::{StepDef, WorkflowGraph};
use crate::engine::backend::{BackendHandle, ProcessBackend};
use crate::engine::tracker::StepTracker;
use crate::error::{AppError, AppResult};
use crate::model::{ExecutionStatus, StepStatus, WorkflowDefinition};
use crate::storage::Store;

/// Sequential in-process implementation of [`ProcessBackend`].
pub struct LocalProcessBackend {
    store: Arc<dyn Store>,
    tracker: Arc<StepTracker>,
    deployments: RwLock<HashMap<String, WorkflowGraph>>,
}

impl LocalProcessBackend {
    /// Create a local backend over a store and tracker.
    pub fn new(store: Arc<dyn Store>, tracker: Arc<StepTracker>) -> Self {
        Self {
            store,
            tracker,
            deployments: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl ProcessBackend for LocalProcessBackend {
    async fn deploy(&self, definition: &WorkflowDefinition) -> AppResult<BackendHandle> {
        let reference = format!("local:{}", definition.id);
        self.deployments
            .write()
            .insert(reference.clone(), definition.graph.clone());
        Ok(BackendHandle { reference })
    }

    async fn start(
        &self,
        handle: &BackendHandle,
        execution_id: Uuid,
        execution_key: &str,
        _variables: &serde_json::Value,
    ) -> AppResult<()> {
        let graph = self
            .deployments
            .read()
            .get(&handle.reference)
            .cloned()
            .ok_or_else(|| {
                AppError::Backend(format!("unknown deployment '{}'", handle.reference))
            })?;

        tracing::debug!(
            execution_id = %execution_id,
            execution_key = %execution_key,
            "Local backend accepted execution"
        );

        let store = self.store.clone();
        let tracker = self.tracker.clone();
        tokio::spawn(async move {
            drive(store, tracker, graph, execution_id).await;
        });

        Ok(())
    }

    async fn cancel(&self, _execution_id: Uuid) -> AppResult<()> {
        // The drive loop observes the persisted status; nothing to do.
        Ok(())
    }

    async fn suspend(&self, _execution_id: Uuid) -> AppResult<()> {
        Ok(())
    }

    async fn resume(&self, _execution_id: Uuid) -> AppResult<()> {
        Ok(())
    }
}

/// Walk the graph and record step lifecycles until done or no longer
/// RUNNING.
async fn drive(
    store: Arc<dyn Store>,
    tracker: Arc<StepTracker>,
    graph: WorkflowGraph,
    execution_id: Uuid,
) {
    // The coordinator flips PENDING -> RUNNING once start() returns; wait
    // for that acknowledgement to land.
    if !wait_until_running(store.as_ref(), execution_id).await {
        return;
    }

    for step in execution_order(&graph) {
        match store.get_execution_any(execution_id).await {
            Ok(Some(execution)) if execution.status == ExecutionStatus::Running => {}
            Ok(_) => {
                tracing::debug!(
                    execution_id = %execution_id,
                    "Execution no longer running, local drive aborting"
                );
                return;
            }
            Err(e) => {
                tracing::warn!(execution_id = %execution_id, error = %e, "Status check failed");
                return;
            }
        }

        let record = match tracker
            .create_step(
                execution_id,
                &step.id,
                &step.name,
                &step.step_type.to_string(),
            )
            .await
        {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(execution_id = %execution_id, error = %e, "Step create failed");
                return;
            }
        };

        // Redelivered step already finished in an earlier drive.
        if record.status.is_terminal() {
            continue;
        }

        if let Some(delay) = step.config.get("delay_ms").and_then(|v| v.as_u64()) {
            tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
        }

        let (status, output, error) = simulate(&step);
        if let Err(e) = tracker
            .update_step(record.id, status, None, output, error)
            .await
        {
            tracing::warn!(execution_id = %execution_id, error = %e, "Step update failed");
            return;
        }

        if status == StepStatus::Failed {
            // Progress rollup already failed the execution.
            return;
        }
    }
}

async fn wait_until_running(store: &dyn Store, execution_id: Uuid) -> bool {
    for _ in 0..200 {
        match store.get_execution_any(execution_id).await {
            Ok(Some(execution)) => match execution.status {
                ExecutionStatus::Running => return true,
                ExecutionStatus::Pending => {}
                _ => return false,
            },
            Ok(None) => return false,
            Err(e) => {
                tracing::warn!(execution_id = %execution_id, error = %e, "Status check failed");
                return false;
            }
        }
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }
    false
}

/// Breadth-first step order from the start events over connections.
fn execution_order(graph: &WorkflowGraph) -> Vec<StepDef> {
    let mut order = Vec::new();
    let mut visited: Vec<&str> = Vec::new();
    let mut frontier: Vec<&str> = graph.start_steps();

    while let Some(step_id) = frontier.first().copied() {
        frontier.remove(0);
        if visited.contains(&step_id) {
            continue;
        }
        visited.push(step_id);
        if let Some(step) = graph.get_step(step_id) {
            order.push(step.clone());
        }
        for next in graph.successors(step_id) {
            if !visited.contains(&next) {
                frontier.push(next);
            }
        }
    }

    order
}

fn simulate(step: &StepDef) -> (StepStatus, Option<serde_json::Value>, Option<String>) {
    match step.config_str("simulate") {
        Some("fail") => (
            StepStatus::Failed,
            None,
            Some(
                step.config_str("error")
                    .unwrap_or("simulated failure")
                    .to_string(),
            ),
        ),
        Some("skip") => (StepStatus::Skipped, None, None),
        _ => (
            StepStatus::Completed,
            Some(serde_json::json!({"status": "ok"})),
            None,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::graph::{Connection, StepType};

    fn step(id: &str, config: serde_json::Value) -> StepDef {
        let config = match config {
            serde_json::Value::Object(map) => map.into_iter().collect(),
            _ => HashMap::new(),
        };
        StepDef {
            id: id.to_string(),
            name: id.to_string(),
            step_type: StepType::Service,
            config,
        }
    }

    fn event(id: &str, kind: &str) -> StepDef {
        let mut s = step(id, serde_json::json!({"event_kind": kind}));
        s.step_type = StepType::Event;
        s
    }

    fn connection(from: &str, to: &str) -> Connection {
        Connection {
            from: from.to_string(),
            to: to.to_string(),
            condition: None,
        }
    }

    #[test]
    fn test_execution_order_is_breadth_first() {
        let graph = WorkflowGraph {
            steps: vec![
                event("start", "start"),
                step("a", serde_json::json!({})),
                step("b", serde_json::json!({})),
                event("end", "end"),
            ],
            connections: vec![
                connection("start", "a"),
                connection("start", "b"),
                connection("a", "end"),
                connection("b", "end"),
            ],
            variables: vec![],
        };

        let order: Vec<String> = execution_order(&graph)
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(order, vec!["start", "a", "b", "end"]);
    }

    #[test]
    fn test_execution_order_handles_cycles() {
        let graph = WorkflowGraph {
            steps: vec![event("start", "start"), step("a", serde_json::json!({}))],
            connections: vec![connection("start", "a"), connection("a", "start")],
            variables: vec![],
        };

        let order = execution_order(&graph);
        assert_eq!(order.len(), 2);
    }

    #[test]
    fn test_simulate_outcomes() {
        let (status, _, error) = simulate(&step("x", serde_json::json!({"simulate": "fail", "error": "boom"})));
        assert_eq!(status, StepStatus::Failed);
        assert_eq!(error.as_deref(), Some("boom"));

        let (status, _, _) = simulate(&step("x", serde_json::json!({"simulate": "skip"})));
        assert_eq!(status, StepStatus::Skipped);

        let (status, output, _) = simulate(&step("x", serde_json::json!({})));
        assert_eq!(status, StepStatus::Completed);
        assert!(output.is_some());
    }
}
