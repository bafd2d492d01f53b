//! NATS JetStream event publisher.
//!
//! The control plane announces execution and rule lifecycle transitions
//! on JetStream subjects. Consumers (dashboards, side-effect workers,
//! sub-workflow starters) subscribe and react; the control plane never
//! waits for them.

use async_nats::jetstream::{self, Context};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Subject for execution lifecycle events.
pub const EXECUTIONS_SUBJECT: &str = "flowplane.executions";

/// Subject for rule execution events.
pub const RULES_SUBJECT: &str = "flowplane.rules";

/// Subject prefix for side-effect requests issued by the action executor.
pub const EFFECTS_SUBJECT_PREFIX: &str = "flowplane.effects";

/// Default JetStream stream name.
pub const DEFAULT_STREAM: &str = "flowplane_events";

/// Errors that can occur during NATS operations.
#[derive(Debug, Error)]
pub enum NatsError {
    #[error("NATS connection error: {0}")]
    Connection(String),

    #[error("JetStream error: {0}")]
    JetStream(String),

    #[error("Publish error: {0}")]
    Publish(String),
}

/// Envelope wrapping every published event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Event type, e.g. `execution.started` or `rule.executed`.
    pub event_type: String,

    /// Publication timestamp.
    pub occurred_at: chrono::DateTime<Utc>,

    /// Event payload.
    pub payload: serde_json::Value,
}

/// NATS JetStream publisher for lifecycle events.
#[derive(Clone)]
pub struct NatsPublisher {
    /// JetStream context.
    js: Context,
}

impl NatsPublisher {
    /// Create a new publisher from an existing client, ensuring the
    /// event stream exists.
    pub async fn new(
        client: Arc<async_nats::Client>,
        stream_name: Option<&str>,
    ) -> Result<Self, NatsError> {
        let stream = stream_name.unwrap_or(DEFAULT_STREAM);
        let js = jetstream::new((*client).clone());

        Self::ensure_stream(&js, stream).await?;

        Ok(Self { js })
    }

    /// Ensure the JetStream stream covering all flowplane subjects exists.
    async fn ensure_stream(js: &Context, stream: &str) -> Result<(), NatsError> {
        match js.get_stream(stream).await {
            Ok(_) => {
                tracing::debug!(stream = %stream, "Using existing NATS stream");
                Ok(())
            }
            Err(_) => {
                let config = jetstream::stream::Config {
                    name: stream.to_string(),
                    subjects: vec!["flowplane.>".to_string()],
                    max_age: std::time::Duration::from_secs(24 * 3600),
                    storage: jetstream::stream::StorageType::File,
                    ..Default::default()
                };

                js.create_stream(config)
                    .await
                    .map_err(|e| NatsError::JetStream(e.to_string()))?;

                tracing::info!(stream = %stream, "Created NATS stream");
                Ok(())
            }
        }
    }

    /// Publish an event to a subject.
    pub async fn publish(
        &self,
        subject: &str,
        event_type: &str,
        payload: serde_json::Value,
    ) -> Result<(), NatsError> {
        let envelope = EventEnvelope {
            event_type: event_type.to_string(),
            occurred_at: Utc::now(),
            payload,
        };

        let bytes = serde_json::to_vec(&envelope)
            .map_err(|e| NatsError::Publish(format!("Serialization error: {}", e)))?;

        self.js
            .publish(subject.to_string(), bytes.into())
            .await
            .map_err(|e| NatsError::Publish(e.to_string()))?
            .await
            .map_err(|e| NatsError::Publish(e.to_string()))?;

        tracing::debug!(
            subject = %subject,
            event_type = %event_type,
            "Published lifecycle event"
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_serialization() {
        let envelope = EventEnvelope {
            event_type: "execution.started".to_string(),
            occurred_at: Utc::now(),
            payload: serde_json::json!({"execution_id": "abc"}),
        };

        let json = serde_json::to_string(&envelope).unwrap();
        assert!(json.contains("execution.started"));
        assert!(json.contains("occurred_at"));
    }

    #[test]
    fn test_default_constants() {
        assert_eq!(EXECUTIONS_SUBJECT, "flowplane.executions");
        assert_eq!(RULES_SUBJECT, "flowplane.rules");
        assert_eq!(DEFAULT_STREAM, "flowplane_events");
    }
}
