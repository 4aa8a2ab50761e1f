//! Server-Sent Events support

use crate::runtime::{SessionView, SseEvent};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use serde_json::json;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

/// Convert a session's broadcast stream to SSE, starting with the full view
pub fn sse_stream(
    init: SessionView,
    broadcast_rx: tokio::sync::broadcast::Receiver<SseEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let init_event = Event::default()
        .event("init")
        .data(json!({ "type": "init", "session": init }).to_string());
    let init = futures::stream::once(async move { Ok(init_event) });

    let broadcasts = BroadcastStream::new(broadcast_rx).filter_map(|result| match result {
        Ok(event) => Some(Ok(sse_event_to_axum(event))),
        Err(_) => None, // Skip lagged messages
    });

    Sse::new(init.chain(broadcasts)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

fn sse_event_to_axum(event: SseEvent) -> Event {
    let (event_type, data) = match event {
        SseEvent::Turn { turn } => ("turn", json!({ "type": "turn", "turn": turn })),
        SseEvent::StateChange { state } => (
            "state_change",
            json!({ "type": "state_change", "state": state }),
        ),
        SseEvent::Error { message } => ("error", json!({ "type": "error", "message": message })),
    };

    Event::default().event(event_type).data(data.to_string())
}
