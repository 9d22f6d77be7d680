//! Wire messages exchanged over `/sync`
//!
//! Frames are JSON text, tagged by `type`.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::SocketLayer;
use crate::models::{ClientUpdate, ModelSnapshot};
use crate::store::ModelStore;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Current model, sent on connect
    DownloadVars(ModelSnapshot),
    /// Reply to the client that uploaded
    UploadAck { version: String, updates: usize },
    /// Broadcast to everyone after an accepted upload
    Progress { version: String, updates: usize },
    Error { message: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    UploadVars(ClientUpdate),
}

/// Handle one inbound text frame and produce the reply for its sender.
pub async fn handle_client_message(
    store: &dyn ModelStore,
    sockets: &SocketLayer,
    text: &str,
) -> ServerMessage {
    let msg: ClientMessage = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => {
            warn!("[Sync] Unparseable client frame: {}", e);
            return ServerMessage::Error {
                message: format!("Invalid message: {}", e),
            };
        }
    };

    match msg {
        ClientMessage::UploadVars(update) => {
            let version = update.model_version.clone();
            debug!("[Sync] uploadVars from {} for {}", update.client_id, version);
            match store.put_update(update).await {
                Ok(updates) => {
                    sockets.broadcast(ServerMessage::Progress {
                        version: version.clone(),
                        updates,
                    });
                    ServerMessage::UploadAck { version, updates }
                }
                Err(e) => {
                    warn!("[Sync] Rejected update: {}", e);
                    ServerMessage::Error {
                        message: e.to_string(),
                    }
                }
            }
        }
    }
}
