//! Workflow definition graph types and static validation.

pub mod graph;
pub mod validator;

pub use graph::{Connection, StepDef, StepType, VariableDef, WorkflowGraph};
pub use validator::validate_graph;
