//! Thin wrapper around the single process-wide `reqwest::Client` used to
//! reach the downstream table service (§5: "a shared outbound HTTP
//! connection pool ... is the only contended resource"). Every component
//! that talks to the downstream service — the resource directory, the
//! profile store, the executor — goes through here so Range/Content-Range
//! handling and error mapping live in one place.

use crate::error::{GatewayError, GatewayResult};
use crate::query::compiler::CompiledRequest;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::instrument;
use url::Url;

#[derive(Clone)]
pub struct DownstreamClient {
    http: reqwest::Client,
    base: Url,
}

/// Result of fetching one page of rows: the decoded row array plus the
/// total derived from `Content-Range` (or `None` if absent/malformed/`*`).
#[derive(Debug, Clone, PartialEq)]
pub struct PagedRows {
    pub rows: Vec<JsonValue>,
    pub total: Option<u64>,
}

impl DownstreamClient {
    pub fn new(base: Url, timeout: Duration) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, base })
    }

    #[cfg(test)]
    pub fn from_client(http: reqwest::Client, base: Url) -> Self {
        Self { http, base }
    }

    /// Raw point-lookup against a directory-style table, used by the
    /// resource directory and profile store: `GET <base>/<table>?<params>`.
    #[instrument(skip(self, params))]
    pub async fn select(&self, table: &str, params: &[(String, String)]) -> GatewayResult<Vec<JsonValue>> {
        let url = self.table_url(table);
        let response = self
            .http
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(map_transport_error)?;
        decode_rows(response).await
    }

    /// Execute a compiled data request, returning rows plus the total row
    /// count as reported by `Content-Range` (§4.5).
    #[instrument(skip(self, compiled))]
    pub async fn fetch_page(&self, compiled: &CompiledRequest) -> GatewayResult<PagedRows> {
        let url = self.table_url(&compiled.table);
        let mut builder = self
            .http
            .get(url)
            .query(&compiled.query_params)
            .header("Range-Unit", "rows")
            .header(
                "Range",
                format!("{}-{}", compiled.range_start, compiled.range_end_inclusive),
            );
        if compiled.prefer_exact_count {
            builder = builder.header("Prefer", "count=exact");
        }
        let response = builder.send().await.map_err(map_transport_error)?;
        let total = response
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range);
        let rows = decode_rows(response).await?;
        Ok(PagedRows { rows, total })
    }

    /// Issue the group-count total probe (§4.5) and return only the total.
    #[instrument(skip(self, compiled))]
    pub async fn fetch_total(&self, compiled: &CompiledRequest) -> GatewayResult<Option<u64>> {
        let paged = self.fetch_page(compiled).await?;
        Ok(paged.total)
    }

    fn table_url(&self, table: &str) -> Url {
        self.base.join(table).unwrap_or_else(|_| self.base.clone())
    }
}

async fn decode_rows(response: reqwest::Response) -> GatewayResult<Vec<JsonValue>> {
    let status = response.status();
    if status.is_success() {
        response
            .json::<Vec<JsonValue>>()
            .await
            .map_err(|e| GatewayError::Internal(format!("malformed downstream response body: {e}")))
    } else if status.is_client_error() {
        // The gateway is responsible for producing a well-formed request;
        // a 4xx here means the gateway itself is broken, not the client.
        Err(GatewayError::Internal(format!(
            "downstream rejected a well-formed request with status {status}"
        )))
    } else {
        Err(GatewayError::DownstreamUnavailable(format!(
            "downstream returned status {status}"
        )))
    }
}

fn map_transport_error(err: reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::DownstreamTimeout
    } else {
        GatewayError::DownstreamUnavailable(err.to_string())
    }
}

/// Parse a `Content-Range: <first>-<last>/<total>` header value. Returns
/// `None` when the header is malformed or the total is `*` (unknown) —
/// callers must degrade gracefully, never raise, per §4.5.
pub fn parse_content_range(header: &str) -> Option<u64> {
    let (_range, total) = header.split_once('/')?;
    if total == "*" {
        None
    } else {
        total.parse::<u64>().ok()
    }
}
