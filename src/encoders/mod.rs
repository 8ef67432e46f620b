//! Response encoders (§4.6): the JSON page envelope, the streaming CSV
//! encoder, and the flat JSON encoder. CSV and flat JSON share one internal
//! pager that walks pages until exhausted, honoring backpressure and
//! cancellation (§5).

pub mod csv;
pub mod flat_json;
pub mod json;

use crate::domain::ResourceRef;
use crate::downstream::client::DownstreamClient;
use crate::error::GatewayResult;
use crate::executor::execute;
use crate::query::plan::QueryPlan;
use serde_json::Value as JsonValue;
use tokio::sync::mpsc;
use tracing::instrument;

/// Default channel depth for the page pager: a capacity of one page means the
/// producer can have at most one page "ahead" of what the consumer has
/// accepted, which is the backpressure contract §4.6 asks for.
const PAGER_CHANNEL_DEPTH: usize = 1;

/// Walk `plan`'s pages against the downstream service, starting at
/// `plan.page`, sending each page's rows on the returned channel until a
/// short page (fewer rows than `page_size`) signals exhaustion, an error
/// occurs, or the receiver is dropped (client cancellation).
///
/// The in-flight downstream fetch itself is cancelled promptly on receiver
/// drop by racing it against `tx.closed()`.
#[instrument(skip(client, plan, resource))]
pub fn page_rows(
    client: DownstreamClient,
    plan: QueryPlan,
    resource: ResourceRef,
) -> mpsc::Receiver<GatewayResult<Vec<JsonValue>>> {
    let (tx, rx) = mpsc::channel(PAGER_CHANNEL_DEPTH);

    tokio::spawn(async move {
        let mut page = plan.page;
        loop {
            let mut this_page = plan.clone();
            this_page.page = page;

            let fetched = tokio::select! {
                biased;
                _ = tx.closed() => break,
                result = execute(&client, &this_page, &resource) => result,
            };

            match fetched {
                Ok(executed) => {
                    let exhausted = executed.rows.len() < plan.page_size as usize;
                    if tx.send(Ok(executed.rows)).await.is_err() {
                        break;
                    }
                    if exhausted {
                        break;
                    }
                }
                Err(err) => {
                    let _ = tx.send(Err(err)).await;
                    break;
                }
            }
            page += 1;
        }
    });

    rx
}

/// Render one JSON scalar as a flat string for the CSV encoder. Objects and
/// arrays are serialized back to compact JSON text rather than dropped.
pub(crate) fn scalar_to_text(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => String::new(),
        JsonValue::String(s) => s.clone(),
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Column header for a page of rows: the explicit projection if one was
/// requested, otherwise the first row's key order (§4.6). `None` when there
/// is no projection and no rows to infer a header from.
pub(crate) fn derive_header(
    projection: &crate::query::plan::Projection,
    first_row: Option<&JsonValue>,
) -> Option<Vec<String>> {
    match projection {
        crate::query::plan::Projection::Columns(cols) => Some(cols.clone()),
        crate::query::plan::Projection::All => first_row
            .and_then(|row| row.as_object())
            .map(|obj| obj.keys().cloned().collect()),
    }
}
