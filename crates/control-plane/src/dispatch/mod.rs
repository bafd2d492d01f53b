//! Side-effect dispatch.
//!
//! The action executor never performs side effects itself; it translates
//! declarative actions into typed [`SideEffectRequest`]s and hands them to
//! a dispatcher. A dispatcher acknowledges that the request was accepted,
//! not that it was delivered.
//!
//! The default dispatcher publishes requests to NATS effect subjects
//! (mail, notification and task workers consume them) and issues webhook
//! calls through a detached HTTP client task. The recording dispatcher
//! backs tests and rule dry-runs.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::events::publisher::{NatsPublisher, EFFECTS_SUBJECT_PREFIX};
use crate::result_ext::ResultExt;

/// A typed side-effect request translated from a rule action.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SideEffectRequest {
    /// Send an email through the mail dispatcher.
    Email {
        recipient: String,
        subject: String,
        body: String,
    },
    /// Send an in-app or chat notification.
    Notification { recipient: String, message: String },
    /// Create a follow-up task for a user.
    Task {
        title: String,
        assignee: Option<String>,
        due_date: Option<String>,
    },
    /// Invoke an external webhook.
    Webhook {
        url: String,
        method: String,
        payload: serde_json::Value,
    },
    /// Update fields on a business record.
    RecordUpdate {
        entity_type: String,
        entity_id: String,
        fields: serde_json::Value,
    },
    /// Start another workflow.
    WorkflowStart {
        definition_id: Uuid,
        variables: serde_json::Value,
    },
}

impl SideEffectRequest {
    /// Effect channel name, used as the NATS subject suffix.
    pub fn channel(&self) -> &'static str {
        match self {
            Self::Email { .. } => "email",
            Self::Notification { .. } => "notification",
            Self::Task { .. } => "task",
            Self::Webhook { .. } => "webhook",
            Self::RecordUpdate { .. } => "record",
            Self::WorkflowStart { .. } => "workflow",
        }
    }
}

/// Accepts side-effect requests on behalf of external collaborators.
#[async_trait]
pub trait SideEffectDispatcher: Send + Sync {
    /// Accept a request for asynchronous delivery.
    async fn dispatch(&self, tenant_id: Uuid, request: SideEffectRequest) -> AppResult<()>;
}

/// Production dispatcher: NATS effect subjects plus a detached HTTP task
/// for webhooks.
pub struct DefaultDispatcher {
    publisher: NatsPublisher,
    http: reqwest::Client,
}

impl DefaultDispatcher {
    /// Create a dispatcher over a NATS publisher.
    pub fn new(publisher: NatsPublisher) -> Self {
        Self {
            publisher,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl SideEffectDispatcher for DefaultDispatcher {
    async fn dispatch(&self, tenant_id: Uuid, request: SideEffectRequest) -> AppResult<()> {
        match &request {
            SideEffectRequest::Webhook {
                url,
                method,
                payload,
            } => {
                // Issue the call without blocking on delivery; acceptance
                // means the request left the control plane.
                let builder = match method.to_uppercase().as_str() {
                    "GET" => self.http.get(url),
                    "PUT" => self.http.put(url).json(payload),
                    "PATCH" => self.http.patch(url).json(payload),
                    _ => self.http.post(url).json(payload),
                };
                let url = url.clone();
                tokio::spawn(async move {
                    let _ = builder
                        .send()
                        .await
                        .log(format!("webhook delivery to {}", url));
                });
                Ok(())
            }
            _ => {
                let subject = format!("{}.{}", EFFECTS_SUBJECT_PREFIX, request.channel());
                let payload = serde_json::json!({
                    "tenant_id": tenant_id,
                    "request": request,
                });
                self.publisher
                    .publish(&subject, "effect.requested", payload)
                    .await
                    .map_err(|e| AppError::Nats(e.to_string()))
            }
        }
    }
}

/// Recording dispatcher for tests and rule dry-runs.
#[derive(Default)]
pub struct RecordingDispatcher {
    requests: parking_lot::Mutex<Vec<(Uuid, SideEffectRequest)>>,
}

impl RecordingDispatcher {
    /// Create an empty recording dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the accepted requests.
    pub fn requests(&self) -> Vec<(Uuid, SideEffectRequest)> {
        self.requests.lock().clone()
    }

    /// Number of accepted requests.
    pub fn len(&self) -> usize {
        self.requests.lock().len()
    }

    /// Whether no request was accepted.
    pub fn is_empty(&self) -> bool {
        self.requests.lock().is_empty()
    }
}

#[async_trait]
impl SideEffectDispatcher for RecordingDispatcher {
    async fn dispatch(&self, tenant_id: Uuid, request: SideEffectRequest) -> AppResult<()> {
        self.requests.lock().push((tenant_id, request));
        Ok(())
    }
}
