//! Resolves an opaque `resource_id` to a concrete table reference (§4.1) by
//! point-querying the downstream `resources` and `tables_index` directory
//! tables, and overlays the `exceptions` aggregation whitelist with the
//! process-wide `ALLOW_AGGREGATION` config list.

use crate::domain::{ResourceRef, ResourceStatus};
use crate::downstream::client::DownstreamClient;
use crate::error::{GatewayError, GatewayResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

#[async_trait]
pub trait ResourceDirectory: Send + Sync {
    /// Resolve a resource id to its table reference.
    ///
    /// # Postconditions
    /// - Returns `Err(ResourceGone)` if the resource exists with
    ///   `status=deleted`, regardless of whether `tables_index` has an
    ///   entry for it (a `Gone` verdict preempts the table-index lookup).
    /// - Returns `Err(ResourceNotFound)` if either the `resources` row or
    ///   the `tables_index` row is missing.
    async fn resolve(&self, resource_id: Uuid) -> GatewayResult<ResourceRef>;
}

#[derive(Debug, Deserialize)]
struct ResourceRow {
    resource_id: Uuid,
    status: String,
    dataset_id: Option<Uuid>,
    created_at: Option<DateTime<Utc>>,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TableIndexRow {
    table_name: String,
}

#[derive(Debug, Deserialize)]
struct ExceptionRow {
    #[allow(dead_code)]
    resource_id: Uuid,
}

pub struct PostgrestResourceDirectory {
    client: Arc<DownstreamClient>,
    allow_aggregation: Vec<Uuid>,
}

impl PostgrestResourceDirectory {
    pub fn new(client: Arc<DownstreamClient>, allow_aggregation: Vec<Uuid>) -> Self {
        Self {
            client,
            allow_aggregation,
        }
    }
}

#[async_trait]
impl ResourceDirectory for PostgrestResourceDirectory {
    async fn resolve(&self, resource_id: Uuid) -> GatewayResult<ResourceRef> {
        let resource_rows = self
            .client
            .select(
                "resources",
                &[("resource_id".to_string(), format!("eq.{resource_id}"))],
            )
            .await?;
        let resource_row: ResourceRow = match resource_rows.into_iter().next() {
            Some(row) => serde_json::from_value(row)
                .map_err(|e| GatewayError::Internal(format!("malformed resources row: {e}")))?,
            None => return Err(GatewayError::ResourceNotFound { resource_id }),
        };

        if resource_row.status == "deleted" {
            return Err(GatewayError::ResourceGone {
                resource_id,
                dataset_id: resource_row.dataset_id,
            });
        }

        let table_rows = self
            .client
            .select(
                "tables_index",
                &[("resource_id".to_string(), format!("eq.{resource_id}"))],
            )
            .await?;
        let table_row: TableIndexRow = match table_rows.into_iter().next() {
            Some(row) => serde_json::from_value(row)
                .map_err(|e| GatewayError::Internal(format!("malformed tables_index row: {e}")))?,
            None => return Err(GatewayError::ResourceNotFound { resource_id }),
        };

        let exception_rows = self
            .client
            .select(
                "exceptions",
                &[("resource_id".to_string(), format!("eq.{resource_id}"))],
            )
            .await?;
        let listed: Vec<ExceptionRow> = exception_rows
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<_, _>>()
            .map_err(|e| GatewayError::Internal(format!("malformed exceptions row: {e}")))?;
        let aggregation_allowed = !listed.is_empty() || self.allow_aggregation.contains(&resource_id);

        Ok(ResourceRef {
            resource_id,
            table_name: table_row.table_name,
            status: ResourceStatus::Ok,
            dataset_id: resource_row.dataset_id,
            aggregation_allowed,
            url: resource_row.url,
            created_at: resource_row.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Minimal in-memory double for unit-testing the resolution logic
    /// without a running downstream service.
    struct FakeDirectory {
        resources: Vec<serde_json::Value>,
        tables: Vec<serde_json::Value>,
        exceptions: Vec<serde_json::Value>,
        allow_aggregation: Vec<Uuid>,
    }

    #[async_trait]
    impl ResourceDirectory for FakeDirectory {
        async fn resolve(&self, resource_id: Uuid) -> GatewayResult<ResourceRef> {
            let resource_row = self
                .resources
                .iter()
                .find(|r| r["resource_id"] == json!(resource_id))
                .cloned();
            let resource_row: ResourceRow = match resource_row {
                Some(v) => serde_json::from_value(v).unwrap(),
                None => return Err(GatewayError::ResourceNotFound { resource_id }),
            };
            if resource_row.status == "deleted" {
                return Err(GatewayError::ResourceGone {
                    resource_id,
                    dataset_id: resource_row.dataset_id,
                });
            }
            let table_row = self
                .tables
                .iter()
                .find(|r| r["resource_id"] == json!(resource_id))
                .cloned();
            let table_row: TableIndexRow = match table_row {
                Some(v) => serde_json::from_value(v).unwrap(),
                None => return Err(GatewayError::ResourceNotFound { resource_id }),
            };
            let aggregation_allowed = self
                .exceptions
                .iter()
                .any(|r| r["resource_id"] == json!(resource_id))
                || self.allow_aggregation.contains(&resource_id);
            Ok(ResourceRef {
                resource_id,
                table_name: table_row.table_name,
                status: ResourceStatus::Ok,
                dataset_id: resource_row.dataset_id,
                aggregation_allowed,
                url: resource_row.url,
                created_at: resource_row.created_at,
            })
        }
    }

    #[tokio::test]
    async fn deleted_resource_preempts_table_index_lookup() {
        let id = Uuid::new_v4();
        let dir = FakeDirectory {
            resources: vec![json!({
                "resource_id": id, "status": "deleted", "dataset_id": Uuid::new_v4(), "created_at": null, "url": null
            })],
            tables: vec![], // no tables_index entry at all
            exceptions: vec![],
            allow_aggregation: vec![],
        };
        let err = dir.resolve(id).await.unwrap_err();
        assert!(matches!(err, GatewayError::ResourceGone { .. }));
    }

    #[tokio::test]
    async fn missing_resource_row_is_not_found() {
        let dir = FakeDirectory {
            resources: vec![],
            tables: vec![],
            exceptions: vec![],
            allow_aggregation: vec![],
        };
        let err = dir.resolve(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, GatewayError::ResourceNotFound { .. }));
    }

    #[tokio::test]
    async fn config_overlay_grants_aggregation_without_exception_row() {
        let id = Uuid::new_v4();
        let dir = FakeDirectory {
            resources: vec![json!({
                "resource_id": id, "status": "ok", "dataset_id": null, "created_at": null, "url": null
            })],
            tables: vec![json!({"resource_id": id, "table_name": "table_abc"})],
            exceptions: vec![],
            allow_aggregation: vec![id],
        };
        let resolved = dir.resolve(id).await.unwrap();
        assert!(resolved.aggregation_allowed);
    }
}
