//! Rule action execution.
//!
//! Actions are `{type, ...fields}` objects from a closed set, executed
//! strictly in declaration order. Each action is translated into a typed
//! side-effect request for the dispatcher and echoed into an
//! [`ActionResult`]. A single malformed action aborts the remaining
//! actions and fails the rule execution.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dispatch::{SideEffectDispatcher, SideEffectRequest};
use crate::error::{AppError, AppResult};

/// A declarative rule action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionDef {
    /// Action type name; parsed at execution time.
    #[serde(rename = "type")]
    pub action_type: String,

    /// Type-specific fields.
    #[serde(flatten)]
    pub params: HashMap<String, serde_json::Value>,
}

impl ActionDef {
    fn str_param(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(|v| v.as_str())
    }
}

/// The closed set of supported action kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    SetField,
    SendEmail,
    CreateTask,
    TriggerWorkflow,
    SendNotification,
    CallWebhook,
    UpdateRecord,
}

impl ActionKind {
    /// Parse an action type name. Unknown names are an evaluation error.
    pub fn parse(name: &str) -> AppResult<Self> {
        match name {
            "set_field" => Ok(Self::SetField),
            "send_email" => Ok(Self::SendEmail),
            "create_task" => Ok(Self::CreateTask),
            "trigger_workflow" => Ok(Self::TriggerWorkflow),
            "send_notification" => Ok(Self::SendNotification),
            "call_webhook" => Ok(Self::CallWebhook),
            "update_record" => Ok(Self::UpdateRecord),
            other => Err(AppError::Evaluation(format!(
                "unknown action type '{}'",
                other
            ))),
        }
    }

    /// Fields an action of this kind must declare.
    pub fn required_fields(&self) -> &'static [&'static str] {
        match self {
            Self::SetField => &["field", "value"],
            Self::SendEmail => &["recipient", "subject"],
            Self::CreateTask => &["title"],
            Self::TriggerWorkflow => &["definition_id"],
            Self::SendNotification => &["recipient", "message"],
            Self::CallWebhook => &["url"],
            Self::UpdateRecord => &["fields"],
        }
    }
}

/// Result of one executed action: the type, the acceptance status and the
/// echoed key fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    /// Action type name.
    pub action_type: String,

    /// Acceptance status; "requested" once the side effect is issued.
    pub status: String,

    /// Echoed type-specific fields.
    #[serde(flatten)]
    pub details: HashMap<String, serde_json::Value>,
}

impl ActionResult {
    fn requested(action_type: &str, details: serde_json::Value) -> Self {
        let details = match details {
            serde_json::Value::Object(map) => map.into_iter().collect(),
            _ => HashMap::new(),
        };
        Self {
            action_type: action_type.to_string(),
            status: "requested".to_string(),
            details,
        }
    }
}

/// Check an action's shape without executing it: known type, required
/// fields present. Used by rule create/update validation.
pub fn check_action_shape(action: &ActionDef) -> Result<(), String> {
    let kind = match ActionKind::parse(&action.action_type) {
        Ok(kind) => kind,
        Err(e) => return Err(e.to_string()),
    };

    for field in kind.required_fields() {
        if !action.params.contains_key(*field) {
            return Err(format!(
                "{} action missing required field '{}'",
                action.action_type, field
            ));
        }
    }
    Ok(())
}

/// Executes action lists by translating each action into a side-effect
/// request.
pub struct ActionExecutor {
    dispatcher: Arc<dyn SideEffectDispatcher>,
}

impl ActionExecutor {
    /// Create an executor over a dispatcher.
    pub fn new(dispatcher: Arc<dyn SideEffectDispatcher>) -> Self {
        Self { dispatcher }
    }

    /// Execute actions in declaration order against a record.
    ///
    /// A malformed action aborts the remaining actions; the error becomes
    /// the rule execution's failure.
    pub async fn execute(
        &self,
        tenant_id: Uuid,
        entity_type: &str,
        entity_id: &str,
        actions: &[ActionDef],
        record: &serde_json::Value,
    ) -> AppResult<Vec<ActionResult>> {
        let mut results = Vec::with_capacity(actions.len());

        for action in actions {
            let (request, result) = self.translate(action, entity_type, entity_id, record)?;
            self.dispatcher.dispatch(tenant_id, request).await?;
            results.push(result);
        }

        Ok(results)
    }

    /// Translate one action into a side-effect request and its echo.
    fn translate(
        &self,
        action: &ActionDef,
        entity_type: &str,
        entity_id: &str,
        record: &serde_json::Value,
    ) -> AppResult<(SideEffectRequest, ActionResult)> {
        let kind = ActionKind::parse(&action.action_type)?;

        match kind {
            ActionKind::SetField => {
                let field = self.require_str(action, "field")?;
                let value = self.require(action, "value")?.clone();
                let mut fields = serde_json::Map::new();
                fields.insert(field.to_string(), value.clone());
                let request = SideEffectRequest::RecordUpdate {
                    entity_type: entity_type.to_string(),
                    entity_id: entity_id.to_string(),
                    fields: serde_json::Value::Object(fields),
                };
                let result = ActionResult::requested(
                    &action.action_type,
                    serde_json::json!({"field": field, "value": value}),
                );
                Ok((request, result))
            }
            ActionKind::SendEmail => {
                let recipient = self.require_str(action, "recipient")?;
                let subject = self.require_str(action, "subject")?;
                let body = action.str_param("body").unwrap_or_default();
                let request = SideEffectRequest::Email {
                    recipient: recipient.to_string(),
                    subject: subject.to_string(),
                    body: body.to_string(),
                };
                let result = ActionResult::requested(
                    &action.action_type,
                    serde_json::json!({"recipient": recipient, "subject": subject}),
                );
                Ok((request, result))
            }
            ActionKind::CreateTask => {
                let title = self.require_str(action, "title")?;
                let assignee = action.str_param("assignee").map(str::to_string);
                let due_date = action.str_param("due_date").map(str::to_string);
                let request = SideEffectRequest::Task {
                    title: title.to_string(),
                    assignee: assignee.clone(),
                    due_date,
                };
                let result = ActionResult::requested(
                    &action.action_type,
                    serde_json::json!({"title": title, "assignee": assignee}),
                );
                Ok((request, result))
            }
            ActionKind::TriggerWorkflow => {
                let raw = self.require_str(action, "definition_id")?;
                let definition_id = Uuid::parse_str(raw).map_err(|_| {
                    AppError::Evaluation(format!(
                        "trigger_workflow action has invalid definition_id '{}'",
                        raw
                    ))
                })?;
                let variables = action
                    .params
                    .get("variables")
                    .cloned()
                    .unwrap_or_else(|| record.clone());
                let request = SideEffectRequest::WorkflowStart {
                    definition_id,
                    variables,
                };
                let result = ActionResult::requested(
                    &action.action_type,
                    serde_json::json!({"definition_id": definition_id}),
                );
                Ok((request, result))
            }
            ActionKind::SendNotification => {
                let recipient = self.require_str(action, "recipient")?;
                let message = self.require_str(action, "message")?;
                let request = SideEffectRequest::Notification {
                    recipient: recipient.to_string(),
                    message: message.to_string(),
                };
                let result = ActionResult::requested(
                    &action.action_type,
                    serde_json::json!({"recipient": recipient, "message": message}),
                );
                Ok((request, result))
            }
            ActionKind::CallWebhook => {
                let url = self.require_str(action, "url")?;
                let method = action.str_param("method").unwrap_or("POST");
                let payload = action
                    .params
                    .get("payload")
                    .cloned()
                    .unwrap_or_else(|| record.clone());
                let request = SideEffectRequest::Webhook {
                    url: url.to_string(),
                    method: method.to_string(),
                    payload,
                };
                let result = ActionResult::requested(
                    &action.action_type,
                    serde_json::json!({"url": url, "method": method}),
                );
                Ok((request, result))
            }
            ActionKind::UpdateRecord => {
                let fields = self.require(action, "fields")?;
                if !fields.is_object() {
                    return Err(AppError::Evaluation(
                        "update_record action requires an object-valued 'fields'".to_string(),
                    ));
                }
                let request = SideEffectRequest::RecordUpdate {
                    entity_type: entity_type.to_string(),
                    entity_id: entity_id.to_string(),
                    fields: fields.clone(),
                };
                let result = ActionResult::requested(
                    &action.action_type,
                    serde_json::json!({"fields": fields}),
                );
                Ok((request, result))
            }
        }
    }

    fn require<'a>(&self, action: &'a ActionDef, key: &str) -> AppResult<&'a serde_json::Value> {
        action.params.get(key).ok_or_else(|| {
            AppError::Evaluation(format!(
                "{} action missing required field '{}'",
                action.action_type, key
            ))
        })
    }

    fn require_str<'a>(&self, action: &'a ActionDef, key: &str) -> AppResult<&'a str> {
        self.require(action, key)?.as_str().ok_or_else(|| {
            AppError::Evaluation(format!(
                "{} action field '{}' must be a string",
                action.action_type, key
            ))
        })
    }
}
