//! Workflow graph types.
//!
//! A graph is a structural tree of steps, directed connections and a
//! variables schema. Downstream code only traverses the structure; step
//! bodies are opaque configuration handed to the process backend.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Supported step types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepType {
    Service,
    User,
    Script,
    Send,
    Receive,
    BusinessRule,
    Manual,
    Gateway,
    Event,
    Subprocess,
}

impl std::fmt::Display for StepType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StepType::Service => "service",
            StepType::User => "user",
            StepType::Script => "script",
            StepType::Send => "send",
            StepType::Receive => "receive",
            StepType::BusinessRule => "business_rule",
            StepType::Manual => "manual",
            StepType::Gateway => "gateway",
            StepType::Event => "event",
            StepType::Subprocess => "subprocess",
        };
        write!(f, "{}", s)
    }
}

/// Gateway kinds a gateway step may declare.
pub const GATEWAY_KINDS: [&str; 4] = ["exclusive", "inclusive", "parallel", "event"];

/// Event kinds an event step may declare. Start and end events delimit
/// the graph; the validator requires at least one of each.
pub const EVENT_KINDS: [&str; 4] = ["start", "end", "timer", "message"];

/// Variable types a variables schema may declare.
pub const VARIABLE_TYPES: [&str; 6] = ["string", "number", "boolean", "date", "object", "array"];

/// One graph node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDef {
    /// Step id, unique within the definition.
    pub id: String,

    /// Display name.
    pub name: String,

    /// Step type.
    #[serde(rename = "type")]
    pub step_type: StepType,

    /// Type-specific configuration (script body, gateway kind, ...).
    #[serde(flatten)]
    pub config: HashMap<String, serde_json::Value>,
}

impl StepDef {
    /// Fetch a string-valued configuration field.
    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.config.get(key).and_then(|v| v.as_str())
    }

    /// Whether this step is a start event.
    pub fn is_start(&self) -> bool {
        self.step_type == StepType::Event && self.config_str("event_kind") == Some("start")
    }

    /// Whether this step is an end event.
    pub fn is_end(&self) -> bool {
        self.step_type == StepType::Event && self.config_str("event_kind") == Some("end")
    }
}

/// A directed connection between two steps, optionally guarded by a
/// condition expression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    /// Source step id.
    pub from: String,

    /// Target step id.
    pub to: String,

    /// Guard expression; `${...}` interpolation syntax.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

/// One declared workflow variable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariableDef {
    /// Variable name.
    pub name: String,

    /// Variable type, one of [`VARIABLE_TYPES`].
    #[serde(rename = "type")]
    pub var_type: String,

    /// Optional default value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
}

/// Complete workflow graph: steps, connections and variables schema.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkflowGraph {
    /// Graph nodes.
    pub steps: Vec<StepDef>,

    /// Directed edges.
    #[serde(default)]
    pub connections: Vec<Connection>,

    /// Variables schema.
    #[serde(default)]
    pub variables: Vec<VariableDef>,
}

impl WorkflowGraph {
    /// Get a step by id.
    pub fn get_step(&self, id: &str) -> Option<&StepDef> {
        self.steps.iter().find(|s| s.id == id)
    }

    /// Ids of all start event steps.
    pub fn start_steps(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|s| s.is_start())
            .map(|s| s.id.as_str())
            .collect()
    }

    /// Ids of all end event steps.
    pub fn end_steps(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|s| s.is_end())
            .map(|s| s.id.as_str())
            .collect()
    }

    /// Outgoing connection targets for a step.
    pub fn successors(&self, step_id: &str) -> Vec<&str> {
        self.connections
            .iter()
            .filter(|c| c.from == step_id)
            .map(|c| c.to.as_str())
            .collect()
    }
}
