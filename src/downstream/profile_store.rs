//! Fetches the column-inference profile for a resource (§4.2) from the
//! downstream `profiles` directory table, keyed by `resource_id`.

use crate::domain::{Profile, ProfileColumn, ResourceRef};
use crate::downstream::client::DownstreamClient;
use crate::error::{GatewayError, GatewayResult};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Fetch the profile for a resolved resource. Failures are mapped to a
    /// distinct `ProfileNotFound` error, not `ResourceNotFound` — the
    /// resource directory already proved the resource exists.
    async fn profile(&self, resource: &ResourceRef) -> GatewayResult<Profile>;
}

#[derive(Debug, Deserialize)]
struct ProfileRow {
    columns: Vec<ProfileColumn>,
    #[serde(default)]
    metadata: serde_json::Value,
}

pub struct PostgrestProfileStore {
    client: Arc<DownstreamClient>,
}

impl PostgrestProfileStore {
    pub fn new(client: Arc<DownstreamClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ProfileStore for PostgrestProfileStore {
    async fn profile(&self, resource: &ResourceRef) -> GatewayResult<Profile> {
        let rows = self
            .client
            .select(
                "profiles",
                &[(
                    "resource_id".to_string(),
                    format!("eq.{}", resource.resource_id),
                )],
            )
            .await?;
        let row: ProfileRow = match rows.into_iter().next() {
            Some(row) => serde_json::from_value(row)
                .map_err(|e| GatewayError::Internal(format!("malformed profiles row: {e}")))?,
            None => {
                return Err(GatewayError::ProfileNotFound {
                    resource_id: resource.resource_id,
                })
            }
        };
        Ok(Profile {
            columns: row.columns,
            metadata: row.metadata,
        })
    }
}
