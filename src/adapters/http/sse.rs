//! SSE fan-out over the event bus.
//!
//! Streams are pure subscriptions: each frame is a refresh hint carrying
//! the entity key, never data. Lagged subscribers lose hints, which is
//! acceptable because consumers re-read state through the API anyway.

use std::convert::Infallible;
use std::sync::Arc;

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use tokio::sync::broadcast::error::RecvError;

use crate::services::{EntityKind, EventBus};

/// Subscribe to the bus and stream hints whose kind is in `kinds`.
pub fn live_stream(
    events: &Arc<EventBus>,
    kinds: &'static [EntityKind],
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = events.subscribe();
    let stream = futures::stream::unfold(rx, move |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(change) if kinds.contains(&change.kind) => {
                    let data = serde_json::to_string(&change).unwrap_or_default();
                    let event = Event::default().event(change.kind.to_string()).data(data);
                    return Some((Ok::<_, Infallible>(event), rx));
                }
                // Uninteresting kind: keep draining
                Ok(_) => {}
                // Dropped hints are fine; subscribers re-read on reconnect
                Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
