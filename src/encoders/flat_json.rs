//! Flat JSON encoder (§4.6.1): the `/data/json/` route. Same internal
//! pager as the CSV encoder — walks pages until exhausted, same
//! backpressure and cancellation contract — but serializes the
//! concatenated rows as a bare JSON array with no envelope.

use crate::domain::ResourceRef;
use crate::downstream::client::DownstreamClient;
use crate::encoders::page_rows;
use crate::query::plan::QueryPlan;
use axum::body::{Body, Bytes};
use futures::stream::unfold;
use std::io;
use tokio::sync::mpsc::Receiver;

struct PagerState {
    rx: Receiver<crate::error::GatewayResult<Vec<serde_json::Value>>>,
    opened: bool,
    emitted: usize,
    done: bool,
}

/// Build the streaming flat-JSON body for one `/data/json/` request.
pub fn build_flat_json_body(client: DownstreamClient, plan: QueryPlan, resource: ResourceRef) -> Body {
    let rx = page_rows(client, plan, resource);
    let state = PagerState {
        rx,
        opened: false,
        emitted: 0,
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
            let closing = if state.opened { "]" } else { "[]" };
            return Some((Ok(Bytes::from_static(closing.as_bytes())), state));
        }
        Some(Err(err)) => {
            state.done = true;
            return Some((Err(io::Error::other(err.to_string())), state));
        }
        Some(Ok(rows)) => rows,
    };

    let mut chunk = String::new();
    if !state.opened {
        chunk.push('[');
        state.opened = true;
    }
    for row in &page {
        if state.emitted > 0 {
            chunk.push(',');
        }
        chunk.push_str(&row.to_string());
        state.emitted += 1;
    }

    Some((Ok(Bytes::from(chunk)), state))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pager_state_starts_unopened() {
        let (_tx, rx) = tokio::sync::mpsc::channel(1);
        let state = PagerState {
            rx,
            opened: false,
            emitted: 0,
            done: false,
        };
        assert!(!state.opened);
        assert_eq!(state.emitted, 0);
    }
}
