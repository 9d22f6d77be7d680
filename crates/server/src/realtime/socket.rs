use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info, warn};

use super::protocol::{handle_client_message, ServerMessage};
use crate::config::AppState;

/// GET /sync
pub async fn sync_socket(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    if !state.sockets.is_live() {
        warn!("[Sync] Connection refused, realtime API not ready");
        return (StatusCode::SERVICE_UNAVAILABLE, "Realtime API not ready").into_response();
    }

    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

fn encode(msg: &ServerMessage) -> Option<Message> {
    match serde_json::to_string(msg) {
        Ok(json) => Some(Message::Text(json.into())),
        Err(e) => {
            error!("[Sync] Failed to encode message: {}", e);
            None
        }
    }
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let mut updates = state.sockets.subscribe();

    info!("[Sync] Client connected");

    let greeting = match state.store.current().await {
        Ok(snapshot) => ServerMessage::DownloadVars(snapshot),
        Err(e) => ServerMessage::Error {
            message: e.to_string(),
        },
    };
    if let Some(frame) = encode(&greeting) {
        if sender.send(frame).await.is_err() {
            return;
        }
    }

    loop {
        tokio::select! {
            incoming = receiver.next() => {
                let reply = match incoming {
                    Some(Ok(Message::Text(text))) => {
                        handle_client_message(state.store.as_ref(), &state.sockets, text.as_str()).await
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        debug!("[Sync] Socket error: {}", e);
                        break;
                    }
                };
                if let Some(frame) = encode(&reply) {
                    if sender.send(frame).await.is_err() {
                        break;
                    }
                }
            }
            broadcast = updates.recv() => {
                match broadcast {
                    Ok(msg) => {
                        if let Some(frame) = encode(&msg) {
                            if sender.send(frame).await.is_err() {
                                break;
                            }
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!("[Sync] Client lagged, skipped {} broadcasts", skipped);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        }
    }

    info!("[Sync] Client disconnected");
}
