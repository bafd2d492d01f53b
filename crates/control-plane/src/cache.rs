//! Tenant-scoped definition cache.
//!
//! Definition reads dominate the start path, so fetched definitions are
//! held with a TTL and invalidated explicitly by the definition service
//! whenever a version is mutated, published or toggled.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use uuid::Uuid;

use crate::model::WorkflowDefinition;

struct CacheEntry {
    cached_at: Instant,
    definition: Arc<WorkflowDefinition>,
}

/// TTL cache for workflow definitions, keyed by (tenant, definition id).
pub struct DefinitionCache {
    ttl: Duration,
    entries: RwLock<HashMap<(Uuid, Uuid), CacheEntry>>,
}

impl DefinitionCache {
    /// Create a cache with the given entry TTL.
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Fetch a cached definition if present and fresh.
    pub fn get(&self, tenant_id: Uuid, definition_id: Uuid) -> Option<Arc<WorkflowDefinition>> {
        let entries = self.entries.read();
        let entry = entries.get(&(tenant_id, definition_id))?;
        if entry.cached_at.elapsed() > self.ttl {
            return None;
        }
        Some(entry.definition.clone())
    }

    /// Cache a definition.
    pub fn insert(&self, definition: WorkflowDefinition) -> Arc<WorkflowDefinition> {
        let definition = Arc::new(definition);
        self.entries.write().insert(
            (definition.tenant_id, definition.id),
            CacheEntry {
                cached_at: Instant::now(),
                definition: definition.clone(),
            },
        );
        definition
    }

    /// Drop one definition from the cache.
    pub fn invalidate(&self, tenant_id: Uuid, definition_id: Uuid) {
        self.entries.write().remove(&(tenant_id, definition_id));
    }

    /// Drop every cached definition for a tenant.
    pub fn invalidate_tenant(&self, tenant_id: Uuid) {
        self.entries
            .write()
            .retain(|(tenant, _), _| *tenant != tenant_id);
    }

    /// Drop expired entries.
    pub fn purge_expired(&self) {
        let ttl = self.ttl;
        self.entries
            .write()
            .retain(|_, entry| entry.cached_at.elapsed() <= ttl);
    }

    /// Number of cached entries, expired or not.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::graph::WorkflowGraph;

    fn definition(tenant_id: Uuid) -> WorkflowDefinition {
        WorkflowDefinition::new(tenant_id, "flow", "1.0", "sales", WorkflowGraph::default(), None)
    }

    #[test]
    fn test_get_insert_invalidate() {
        let cache = DefinitionCache::new(Duration::from_secs(60));
        let tenant = Uuid::new_v4();
        let def = definition(tenant);
        let id = def.id;

        assert!(cache.get(tenant, id).is_none());
        cache.insert(def);
        assert!(cache.get(tenant, id).is_some());

        cache.invalidate(tenant, id);
        assert!(cache.get(tenant, id).is_none());
    }

    #[test]
    fn test_expired_entries_are_not_served() {
        let cache = DefinitionCache::new(Duration::from_millis(0));
        let tenant = Uuid::new_v4();
        let def = definition(tenant);
        let id = def.id;

        cache.insert(def);
        std::thread::sleep(Duration::from_millis(2));
        assert!(cache.get(tenant, id).is_none());

        cache.purge_expired();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_invalidate_tenant_only_touches_that_tenant() {
        let cache = DefinitionCache::new(Duration::from_secs(60));
        let tenant_a = Uuid::new_v4();
        let tenant_b = Uuid::new_v4();
        let def_a = definition(tenant_a);
        let def_b = definition(tenant_b);
        let (id_a, id_b) = (def_a.id, def_b.id);

        cache.insert(def_a);
        cache.insert(def_b);

        cache.invalidate_tenant(tenant_a);
        assert!(cache.get(tenant_a, id_a).is_none());
        assert!(cache.get(tenant_b, id_b).is_some());
    }
}
