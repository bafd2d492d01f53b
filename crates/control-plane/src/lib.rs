//! Flowplane Control Plane Library
//!
//! Core of the Flowplane workflow platform:
//!
//! - **Definition Validation**: static checks of workflow graphs before
//!   they can run (structure, step types, flow, reachability, variables)
//! - **Rule Engine**: condition-tree evaluation and declarative action
//!   execution against entity trigger events
//! - **Execution Coordination**: the execution lifecycle state machine
//!   with asynchronous hand-off to a pluggable process backend
//! - **Step Tracking**: idempotent per-step records feeding progress
//!   rollup
//!
//! ## Architecture
//!
//! State lives in PostgreSQL behind the [`storage::Store`] trait (an
//! in-memory implementation backs tests and the local CLI runtime).
//! Lifecycle transitions are announced on NATS JetStream, fire and
//! forget. The component that actually advances a running execution is
//! an external process backend reached through
//! [`engine::ProcessBackend`]; step callbacks land on
//! [`engine::StepTracker`], which drives progress recomputation.
//!
//! ## Modules
//!
//! - [`config`]: environment-based configuration
//! - [`definition`]: graph types and the definition validator
//! - [`rules`]: condition evaluator, action executor, rule coordinator
//! - [`engine`]: execution coordinator, step tracker, process backend
//! - [`storage`]: the store trait with Postgres and in-memory backends
//! - [`events`]: NATS lifecycle event publishing
//! - [`dispatch`]: side-effect request dispatch
//! - [`services`]: exposed operations (definitions, queries, rules, stats)
//!
//! ## Example
//!
//! ```
//! use flowplane_control_plane::{config::AppConfig, state::AppState};
//!
//! // In-memory wiring: no PostgreSQL or NATS required.
//! let state = AppState::local(AppConfig::default());
//! assert!(!state.events.is_enabled());
//! ```

pub mod cache;
pub mod config;
pub mod definition;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod events;
pub mod model;
pub mod result_ext;
pub mod rules;
pub mod services;
pub mod state;
pub mod storage;

pub use error::{AppError, AppResult, ValidationErrors};
pub use result_ext::ResultExt;
