//! The process-backend boundary.
//!
//! The backend is the external component that actually advances a running
//! execution node by node. The control plane only issues requests:
//! deploy a definition graph, start a run under a business key, and ask
//! for cancel/suspend/resume. Step-lifecycle callbacks flow back through
//! the step tracker.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::AppResult;
use crate::model::WorkflowDefinition;

/// Opaque reference to a deployed definition on the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendHandle {
    /// Backend-specific deployment reference.
    pub reference: String,
}

/// External process orchestration backend.
///
/// All methods are requests, not guarantees: the persisted execution
/// status stays the single source of truth, and the backend is expected
/// to consult it before advancing a step.
#[async_trait]
pub trait ProcessBackend: Send + Sync {
    /// Deploy a definition graph, returning a handle for starts.
    async fn deploy(&self, definition: &WorkflowDefinition) -> AppResult<BackendHandle>;

    /// Start the asynchronous drive of an execution. Must return once
    /// the run is accepted; the actual stepping happens elsewhere.
    async fn start(
        &self,
        handle: &BackendHandle,
        execution_id: Uuid,
        execution_key: &str,
        variables: &serde_json::Value,
    ) -> AppResult<()>;

    /// Request that in-flight work for an execution be abandoned.
    async fn cancel(&self, execution_id: Uuid) -> AppResult<()>;

    /// Request that an execution pause after the current step.
    async fn suspend(&self, execution_id: Uuid) -> AppResult<()>;

    /// Request that a suspended execution continue.
    async fn resume(&self, execution_id: Uuid) -> AppResult<()>;
}
