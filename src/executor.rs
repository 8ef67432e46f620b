//! Pagination controller (§4.5): issues the compiled request, reads the
//! `Content-Range` total, and — for aggregated plans — issues the
//! additional group-count total probe.

use crate::domain::ResourceRef;
use crate::downstream::client::DownstreamClient;
use crate::error::GatewayResult;
use crate::query::compiler::{compile, compile_group_total_probe};
use crate::query::plan::QueryPlan;
use serde_json::Value as JsonValue;
use tracing::instrument;

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutedPage {
    pub rows: Vec<JsonValue>,
    pub total: Option<u64>,
}

/// Run one data read end to end: compile, fetch, and (for aggregated plans
/// with a non-empty `group_by`) replace the pre-aggregation total with the
/// group-count probe's result.
#[instrument(skip(client, plan, resource))]
pub async fn execute(
    client: &DownstreamClient,
    plan: &QueryPlan,
    resource: &ResourceRef,
) -> GatewayResult<ExecutedPage> {
    let compiled = compile(plan, &resource.table_name);
    let paged = client.fetch_page(&compiled).await?;

    let total = if plan.is_aggregated() {
        if plan.aggregation.group_by.is_empty() {
            // A single-row aggregate with no grouping: the probe would be
            // redundant, the result is always one row (§4.5).
            Some(1)
        } else {
            let probe = compile_group_total_probe(plan, &resource.table_name);
            client.fetch_total(&probe).await?
        }
    } else {
        paged.total
    };

    Ok(ExecutedPage {
        rows: paged.rows,
        total,
    })
}
