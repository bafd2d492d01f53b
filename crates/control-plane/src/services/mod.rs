//! Service layer for the Flowplane Control Plane.
//!
//! Services are the exposed-operation boundary: definition lifecycle,
//! execution queries, rule CRUD and dashboard statistics. Execution
//! lifecycle commands live on the engine's coordinator; rule firing lives
//! on the rule coordinator.

pub mod definition;
pub mod execution;
pub mod rule;
pub mod stats;

pub use definition::DefinitionService;
pub use execution::ExecutionService;
pub use rule::RuleService;
pub use stats::StatsService;
