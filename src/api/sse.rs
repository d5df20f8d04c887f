//! Server-sent event framing for the live streams.

use std::convert::Infallible;
use std::time::Duration;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::{Stream, StreamExt};
use serde::Serialize;

use crate::config::SSE_KEEP_ALIVE_SECS;

/// One `data:` frame per item, JSON-encoded, with periodic keep-alive
/// comments. Items that fail to encode are skipped.
pub fn json_event_stream<S, T>(
    items: S,
) -> Sse<impl Stream<Item = Result<Event, Infallible>> + Send + 'static>
where
    S: Stream<Item = T> + Send + 'static,
    T: Serialize + Send + 'static,
{
    let events = items.filter_map(|item| async move {
        match Event::default().json_data(&item) {
            Ok(event) => Some(Ok(event)),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to encode stream event");
                None
            }
        }
    });

    Sse::new(events).keep_alive(KeepAlive::new().interval(Duration::from_secs(SSE_KEEP_ALIVE_SECS)))
}
