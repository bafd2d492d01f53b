//! Lifecycle event publishing for the Flowplane Control Plane.
//!
//! Execution and rule lifecycle transitions are announced on NATS
//! JetStream. Publishing is fire-and-forget: delivery failures are logged
//! and never fail the state transition that produced them.

pub mod publisher;

pub use publisher::{NatsPublisher, EXECUTIONS_SUBJECT, RULES_SUBJECT};

use crate::result_ext::ResultExt;

/// Event bus facade over the optional NATS publisher.
///
/// When NATS is not configured the bus is a no-op, so the control plane
/// keeps working in direct mode (tests, local CLI runtime).
#[derive(Clone, Default)]
pub struct EventBus {
    publisher: Option<NatsPublisher>,
}

impl EventBus {
    /// Create a bus backed by a NATS publisher.
    pub fn new(publisher: NatsPublisher) -> Self {
        Self {
            publisher: Some(publisher),
        }
    }

    /// Create a disabled bus that drops every event.
    pub fn disabled() -> Self {
        Self { publisher: None }
    }

    /// Whether events are actually published.
    pub fn is_enabled(&self) -> bool {
        self.publisher.is_some()
    }

    /// Emit a lifecycle event. Failures are logged, never propagated.
    pub async fn emit(&self, subject: &str, event_type: &str, payload: serde_json::Value) {
        if let Some(publisher) = &self.publisher {
            let _ = publisher
                .publish(subject, event_type, payload)
                .await
                .log(format!("publishing {} event", event_type));
        }
    }
}
