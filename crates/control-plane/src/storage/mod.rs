//! Persistence layer for the Flowplane Control Plane.
//!
//! The [`Store`] trait is the persistent-store boundary: PostgreSQL in
//! production ([`postgres::PostgresStore`]), an in-memory implementation
//! ([`memory::MemoryStore`]) for tests and the local CLI runtime.

pub mod memory;
pub mod pool;
pub mod postgres;
pub mod store;

pub use memory::MemoryStore;
pub use pool::{create_pool, DbPool};
pub use postgres::PostgresStore;
pub use store::{ExecutionChange, Store, Transition};
