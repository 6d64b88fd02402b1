//! Live progress stream over WebSocket.
//!
//! Each message is one serialized progress event (JSON text, no envelope).

use std::sync::Arc;

use axum::{
    Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::get,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::debug;

use crate::api::server::AppState;
use crate::broadcast::ChannelObserver;

/// Events buffered per connection before the hub gives up on it.
const OBSERVER_BUFFER: usize = 256;

pub fn router() -> Router<AppState> {
    Router::new().route("/ws/progress", get(progress_ws))
}

async fn progress_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (tx, mut rx) = mpsc::channel::<String>(OBSERVER_BUFFER);
    let observer_id = state.hub.connect(Arc::new(ChannelObserver::new(tx)));
    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        debug!(observer_id, error = %e, "WebSocket error");
                        break;
                    }
                    // Client messages carry nothing we act on.
                    Some(Ok(_)) => {}
                }
            }

            payload = rx.recv() => {
                // `None`: the hub dropped this observer after a failed send.
                let Some(payload) = payload else { break };
                if sender.send(Message::Text(payload.into())).await.is_err() {
                    break;
                }
            }
        }
    }

    state.hub.disconnect(observer_id);
    let _ = sender.close().await;
}
