//! Configuration module for the Flowplane Control Plane.
//!
//! Configuration is loaded from environment variables using the `envy`
//! crate for type-safe parsing.

mod app;
mod database;

pub use app::AppConfig;
pub use database::DatabaseConfig;
