//! Workflow definition model.
//!
//! A definition is a versioned, tenant-owned description of a multi-step
//! process graph. A name may carry multiple versions; published versions
//! are immutable apart from their activation flags.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::definition::graph::WorkflowGraph;

/// A registered workflow definition version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// Unique definition ID (one per version)
    pub id: Uuid,

    /// Owning tenant
    pub tenant_id: Uuid,

    /// Definition name; versions share the name
    pub name: String,

    /// Version string, `major.minor[.patch]`, monotonic per name
    pub version: String,

    /// Grouping category for dashboards and listings
    pub category: String,

    /// Whether executions may be started from this version
    pub is_active: bool,

    /// Whether this version has been published
    pub is_published: bool,

    /// The process graph (steps, connections, variables)
    pub graph: WorkflowGraph,

    /// Trigger configuration (entity events, schedules)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger_config: Option<serde_json::Value>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl WorkflowDefinition {
    /// Create a new, unpublished and inactive definition version.
    pub fn new(
        tenant_id: Uuid,
        name: &str,
        version: &str,
        category: &str,
        graph: WorkflowGraph,
        trigger_config: Option<serde_json::Value>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            name: name.to_string(),
            version: version.to_string(),
            category: category.to_string(),
            is_active: false,
            is_published: false,
            graph,
            trigger_config,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether this version may be used to start an execution.
    pub fn is_startable(&self) -> bool {
        self.is_active && self.is_published
    }
}

/// Parse a `major.minor[.patch]` version string into an ordered tuple.
///
/// Returns `None` when the string does not match the expected shape.
pub fn parse_version(version: &str) -> Option<(u32, u32, u32)> {
    let mut parts = version.split('.');
    let major: u32 = parts.next()?.parse().ok()?;
    let minor: u32 = parts.next()?.parse().ok()?;
    let patch: u32 = match parts.next() {
        Some(p) => p.parse().ok()?,
        None => 0,
    };
    if parts.next().is_some() {
        return None;
    }
    Some((major, minor, patch))
}

/// Produce the next minor version after `version` (patch resets to zero).
pub fn bump_minor(version: &str) -> Option<String> {
    let (major, minor, _) = parse_version(version)?;
    Some(format!("{}.{}", major, minor + 1))
}
