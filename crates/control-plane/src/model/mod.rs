//! Domain models for the Flowplane Control Plane.
//!
//! Tenant-scoped records for workflow definitions, executions, step
//! executions, business rules and rule-execution audit entries.

pub mod definition;
pub mod execution;
pub mod rule;
pub mod step;

pub use definition::*;
pub use execution::*;
pub use rule::*;
pub use step::*;
