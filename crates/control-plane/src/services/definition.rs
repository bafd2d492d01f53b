//! Workflow definition lifecycle service.
//!
//! Definitions are immutable once published except for their activation
//! flags: updating a published definition creates a new version row with
//! a strictly greater version. Every mutation invalidates the definition
//! cache.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cache::DefinitionCache;
use crate::definition::graph::WorkflowGraph;
use crate::definition::validator::validate_graph;
use crate::error::{AppError, AppResult};
use crate::model::definition::{bump_minor, parse_version};
use crate::model::WorkflowDefinition;
use crate::storage::Store;

/// Request to create a definition (first or subsequent version).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDefinitionRequest {
    /// Definition name.
    pub name: String,

    /// Explicit version; defaults to "1.0" for a new name or a minor
    /// bump of the latest version.
    #[serde(default)]
    pub version: Option<String>,

    /// Grouping category.
    #[serde(default = "default_category")]
    pub category: String,

    /// The process graph.
    pub graph: WorkflowGraph,

    /// Trigger configuration.
    #[serde(default)]
    pub trigger_config: Option<serde_json::Value>,
}

fn default_category() -> String {
    "general".to_string()
}

/// Request to update a definition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateDefinitionRequest {
    /// Replacement graph.
    #[serde(default)]
    pub graph: Option<WorkflowGraph>,

    /// Replacement category.
    #[serde(default)]
    pub category: Option<String>,

    /// Replacement trigger configuration.
    #[serde(default)]
    pub trigger_config: Option<serde_json::Value>,

    /// Explicit version for the new row when the target is published.
    #[serde(default)]
    pub version: Option<String>,
}

/// Service for definition operations.
pub struct DefinitionService {
    store: Arc<dyn Store>,
    cache: Arc<DefinitionCache>,
}

impl DefinitionService {
    /// Create a new definition service.
    pub fn new(store: Arc<dyn Store>, cache: Arc<DefinitionCache>) -> Self {
        Self { store, cache }
    }

    /// Register a new definition version. The graph is validated before
    /// anything is stored; version monotonicity is enforced per name.
    pub async fn create(
        &self,
        tenant_id: Uuid,
        request: CreateDefinitionRequest,
    ) -> AppResult<WorkflowDefinition> {
        let latest = self.latest_version(tenant_id, &request.name).await?;

        let version = match request.version {
            Some(version) => version,
            None => match &latest {
                Some(latest) => bump_minor(latest).ok_or_else(|| {
                    AppError::validation(format!(
                        "stored version '{}' cannot be bumped",
                        latest
                    ))
                })?,
                None => "1.0".to_string(),
            },
        };

        validate_graph(&request.name, &version, &request.graph)?;
        self.check_monotonic(&version, latest.as_deref())?;

        let definition = WorkflowDefinition::new(
            tenant_id,
            &request.name,
            &version,
            &request.category,
            request.graph,
            request.trigger_config,
        );
        self.store.insert_definition(&definition).await?;

        tracing::info!(
            definition_id = %definition.id,
            name = %definition.name,
            version = %definition.version,
            "Definition registered"
        );

        Ok(definition)
    }

    /// Update a definition. An unpublished definition is edited in
    /// place; a published one gets a new, unpublished version row.
    pub async fn update(
        &self,
        tenant_id: Uuid,
        definition_id: Uuid,
        request: UpdateDefinitionRequest,
    ) -> AppResult<WorkflowDefinition> {
        let definition = self.require(tenant_id, definition_id).await?;

        if definition.is_published {
            let latest = self.latest_version(tenant_id, &definition.name).await?;
            let version = match request.version {
                Some(version) => version,
                None => {
                    let base = latest.as_deref().unwrap_or(&definition.version);
                    bump_minor(base).ok_or_else(|| {
                        AppError::validation(format!("stored version '{}' cannot be bumped", base))
                    })?
                }
            };

            let graph = request.graph.unwrap_or_else(|| definition.graph.clone());
            validate_graph(&definition.name, &version, &graph)?;
            self.check_monotonic(&version, latest.as_deref())?;

            let successor = WorkflowDefinition::new(
                tenant_id,
                &definition.name,
                &version,
                request.category.as_deref().unwrap_or(&definition.category),
                graph,
                request.trigger_config.or_else(|| definition.trigger_config.clone()),
            );
            self.store.insert_definition(&successor).await?;
            self.cache.invalidate(tenant_id, definition_id);

            tracing::info!(
                definition_id = %successor.id,
                name = %successor.name,
                version = %successor.version,
                "New definition version created from published version"
            );

            return Ok(successor);
        }

        let mut updated = definition;
        if let Some(graph) = request.graph {
            updated.graph = graph;
        }
        if let Some(category) = request.category {
            updated.category = category;
        }
        if let Some(trigger_config) = request.trigger_config {
            updated.trigger_config = Some(trigger_config);
        }
        validate_graph(&updated.name, &updated.version, &updated.graph)?;
        updated.updated_at = Utc::now();

        self.store.update_definition(&updated).await?;
        self.cache.invalidate(tenant_id, definition_id);

        Ok(updated)
    }

    /// Publish a definition version, revalidating its graph first.
    pub async fn publish(
        &self,
        tenant_id: Uuid,
        definition_id: Uuid,
    ) -> AppResult<WorkflowDefinition> {
        let mut definition = self.require(tenant_id, definition_id).await?;
        validate_graph(&definition.name, &definition.version, &definition.graph)?;

        definition.is_published = true;
        definition.updated_at = Utc::now();
        self.store.update_definition(&definition).await?;
        self.cache.invalidate(tenant_id, definition_id);

        tracing::info!(
            definition_id = %definition.id,
            name = %definition.name,
            version = %definition.version,
            "Definition published"
        );

        Ok(definition)
    }

    /// Withdraw a published definition version.
    pub async fn unpublish(
        &self,
        tenant_id: Uuid,
        definition_id: Uuid,
    ) -> AppResult<WorkflowDefinition> {
        self.set_flags(tenant_id, definition_id, None, Some(false)).await
    }

    /// Allow executions to start from this version.
    pub async fn activate(
        &self,
        tenant_id: Uuid,
        definition_id: Uuid,
    ) -> AppResult<WorkflowDefinition> {
        self.set_flags(tenant_id, definition_id, Some(true), None).await
    }

    /// Stop new executions from starting from this version.
    pub async fn deactivate(
        &self,
        tenant_id: Uuid,
        definition_id: Uuid,
    ) -> AppResult<WorkflowDefinition> {
        self.set_flags(tenant_id, definition_id, Some(false), None).await
    }

    /// Clone a definition under a new name as an unpublished "1.0".
    pub async fn clone_definition(
        &self,
        tenant_id: Uuid,
        definition_id: Uuid,
        new_name: &str,
    ) -> AppResult<WorkflowDefinition> {
        let source = self.require(tenant_id, definition_id).await?;

        let existing = self.store.definition_versions(tenant_id, new_name).await?;
        if !existing.is_empty() {
            return Err(AppError::validation(format!(
                "definition name '{}' already exists",
                new_name
            )));
        }

        validate_graph(new_name, "1.0", &source.graph)?;

        let clone = WorkflowDefinition::new(
            tenant_id,
            new_name,
            "1.0",
            &source.category,
            source.graph.clone(),
            source.trigger_config.clone(),
        );
        self.store.insert_definition(&clone).await?;
        Ok(clone)
    }

    /// Fetch a definition through the cache.
    pub async fn get(
        &self,
        tenant_id: Uuid,
        definition_id: Uuid,
    ) -> AppResult<WorkflowDefinition> {
        if let Some(cached) = self.cache.get(tenant_id, definition_id) {
            return Ok((*cached).clone());
        }
        let definition = self.require(tenant_id, definition_id).await?;
        self.cache.insert(definition.clone());
        Ok(definition)
    }

    /// List definitions for a tenant.
    pub async fn list(
        &self,
        tenant_id: Uuid,
        category: Option<&str>,
    ) -> AppResult<Vec<WorkflowDefinition>> {
        self.store.list_definitions(tenant_id, category).await
    }

    async fn set_flags(
        &self,
        tenant_id: Uuid,
        definition_id: Uuid,
        is_active: Option<bool>,
        is_published: Option<bool>,
    ) -> AppResult<WorkflowDefinition> {
        let mut definition = self.require(tenant_id, definition_id).await?;
        if let Some(active) = is_active {
            definition.is_active = active;
        }
        if let Some(published) = is_published {
            definition.is_published = published;
        }
        definition.updated_at = Utc::now();
        self.store.update_definition(&definition).await?;
        self.cache.invalidate(tenant_id, definition_id);
        Ok(definition)
    }

    async fn require(
        &self,
        tenant_id: Uuid,
        definition_id: Uuid,
    ) -> AppResult<WorkflowDefinition> {
        self.store
            .get_definition(tenant_id, definition_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "Workflow definition not found: {}",
                    definition_id
                ))
            })
    }

    async fn latest_version(&self, tenant_id: Uuid, name: &str) -> AppResult<Option<String>> {
        let versions = self.store.definition_versions(tenant_id, name).await?;
        Ok(versions
            .into_iter()
            .max_by_key(|version| parse_version(version)))
    }

    fn check_monotonic(&self, version: &str, latest: Option<&str>) -> AppResult<()> {
        let Some(latest) = latest else {
            return Ok(());
        };
        if parse_version(version) <= parse_version(latest) {
            return Err(AppError::validation(format!(
                "version '{}' must be greater than the latest version '{}'",
                version, latest
            )));
        }
        Ok(())
    }
}
