//! Dashboard statistics service.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppResult;
use crate::model::{ExecutionStatus, RuleExecutionStatus};
use crate::storage::Store;

/// Execution count for one status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionStatusCount {
    pub status: ExecutionStatus,
    pub count: i64,
}

/// Rule execution count for one status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleExecutionStatusCount {
    pub status: RuleExecutionStatus,
    pub count: i64,
}

/// Definition count for one category.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: i64,
}

/// Aggregate statistics for a tenant's dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardStats {
    pub executions_by_status: Vec<ExecutionStatusCount>,
    pub rule_executions_by_status: Vec<RuleExecutionStatusCount>,
    pub definitions_by_category: Vec<CategoryCount>,
}

/// Service for aggregate statistics.
pub struct StatsService {
    store: Arc<dyn Store>,
}

impl StatsService {
    /// Create a new stats service.
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Collect the dashboard aggregates for a tenant.
    pub async fn dashboard(&self, tenant_id: Uuid) -> AppResult<DashboardStats> {
        let executions_by_status = self
            .store
            .count_executions_by_status(tenant_id)
            .await?
            .into_iter()
            .map(|(status, count)| ExecutionStatusCount { status, count })
            .collect();

        let rule_executions_by_status = self
            .store
            .count_rule_executions_by_status(tenant_id)
            .await?
            .into_iter()
            .map(|(status, count)| RuleExecutionStatusCount { status, count })
            .collect();

        let definitions_by_category = self
            .store
            .count_definitions_by_category(tenant_id)
            .await?
            .into_iter()
            .map(|(category, count)| CategoryCount { category, count })
            .collect();

        Ok(DashboardStats {
            executions_by_status,
            rule_executions_by_status,
            definitions_by_category,
        })
    }
}
