//! Websocket stream of lifecycle events
//!
//! Each connection gets its own bus subscription and receives every event as
//! one JSON text frame. Client messages are ignored apart from close.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use libcastdeck::service::EventReceiver;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::AppState;

/// Upgrades `GET /events/ws`
pub async fn events_ws(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    // Subscribe before the upgrade so nothing emitted meanwhile is missed
    let events = state.service.subscribe();
    ws.on_upgrade(move |socket| stream_events(socket, events))
}

async fn stream_events(socket: WebSocket, mut events: EventReceiver) {
    debug!("Event stream client connected");
    let (mut sink, mut incoming) = socket.split();

    loop {
        tokio::select! {
            msg = incoming.next() => match msg {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },

            event = events.recv() => match event {
                Ok(event) => {
                    let payload = match serde_json::to_string(&event) {
                        Ok(payload) => payload,
                        Err(e) => {
                            warn!("Failed to encode event: {}", e);
                            continue;
                        }
                    };
                    if sink.send(Message::Text(payload.into())).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Event stream client lagging, dropped {} event(s)", skipped);
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    debug!("Event stream client disconnected");
}
