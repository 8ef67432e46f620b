//! Streaming CSV encoder (§4.6). Walks pages via the shared pager in
//! `encoders`, writing a header row derived from the first page (or the
//! explicit projection) followed by one CSV row per downstream row, as an
//! axum streaming body so pages are written only as the client accepts them.

use crate::domain::ResourceRef;
use crate::downstream::client::DownstreamClient;
use crate::encoders::{derive_header, page_rows, scalar_to_text};
use crate::query::plan::{Projection, QueryPlan};
use axum::body::{Body, Bytes};
use futures::stream::unfold;
use serde_json::Value as JsonValue;
use std::io;
use tokio::sync::mpsc::Receiver;

struct PagerState {
    rx: Receiver<crate::error::GatewayResult<Vec<JsonValue>>>,
    projection: Projection,
    header: Option<Vec<String>>,
    wrote_header: bool,
    done: bool,
}

/// Build the streaming CSV body for one `/data/csv/` request.
pub fn build_csv_body(client: DownstreamClient, plan: QueryPlan, resource: ResourceRef) -> Body {
    let projection = plan.projection.clone();
    let rx = page_rows(client, plan, resource);
    let state = PagerState {
        rx,
        projection,
        header: None,
        wrote_header: false,
        done: false,
    };
    Body::from_stream(unfold(state, next_chunk))
}

async fn next_chunk(mut state: PagerState) -> Option<(Result<Bytes, io::Error>, PagerState)> {
    if state.done {
        return None;
    }

    let page = match state.rx.recv().await {
        None => {
            state.done = true;
            return None;
        }
        Some(Err(err)) => {
            state.done = true;
            return Some((Err(io::Error::other(err.to_string())), state));
        }
        Some(Ok(rows)) => rows,
    };

    if state.header.is_none() {
        state.header = derive_header(&state.projection, page.first());
    }

    let mut writer = ::csv::WriterBuilder::new().has_headers(false).from_writer(Vec::new());

    let Some(header) = state.header.clone() else {
        // No header yet (empty first page, wildcard projection): nothing to
        // emit for this chunk, keep pulling.
        return Box::pin(next_chunk(state)).await;
    };

    if !state.wrote_header {
        if let Err(err) = writer.write_record(&header) {
            state.done = true;
            return Some((Err(io::Error::other(err.to_string())), state));
        }
        state.wrote_header = true;
    }

    for row in &page {
        let fields: Vec<String> = header
            .iter()
            .map(|col| {
                row.as_object()
                    .and_then(|obj| obj.get(col))
                    .map(scalar_to_text)
                    .unwrap_or_default()
            })
            .collect();
        if let Err(err) = writer.write_record(&fields) {
            state.done = true;
            return Some((Err(io::Error::other(err.to_string())), state));
        }
    }

    let bytes = match writer.into_inner() {
        Ok(buf) => buf,
        Err(err) => {
            state.done = true;
            return Some((Err(io::Error::other(err.to_string())), state));
        }
    };

    Some((Ok(Bytes::from(bytes)), state))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::plan::Projection;

    #[test]
    fn header_derivation_prefers_explicit_projection() {
        let projection = Projection::Columns(vec!["id".to_string(), "score".to_string()]);
        let header = derive_header(&projection, None);
        assert_eq!(header, Some(vec!["id".to_string(), "score".to_string()]));
    }

    #[test]
    fn scalar_to_text_renders_null_as_empty() {
        assert_eq!(scalar_to_text(&JsonValue::Null), "");
        assert_eq!(scalar_to_text(&JsonValue::Bool(true)), "true");
    }
}
