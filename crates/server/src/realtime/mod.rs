//! Realtime sync API
//!
//! Clients connect to `GET /sync` over WebSocket. The socket layer refuses
//! upgrades until [`RealtimeApi::setup`] has run.

pub mod protocol;
pub mod socket;

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

use crate::store::ModelStore;

pub use protocol::{handle_client_message, ClientMessage, ServerMessage};
pub use socket::sync_socket;

#[async_trait]
pub trait RealtimeApi: Send + Sync {
    /// Activate the protocol. Once this resolves clients may connect.
    async fn setup(&self) -> Result<()>;
}

/// Server-side socket hub shared by every connection
#[derive(Clone)]
pub struct SocketLayer {
    live: Arc<AtomicBool>,
    tx: broadcast::Sender<ServerMessage>,
}

impl SocketLayer {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(100);
        Self {
            live: Arc::new(AtomicBool::new(false)),
            tx,
        }
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }

    fn activate(&self) {
        self.live.store(true, Ordering::Release);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ServerMessage> {
        self.tx.subscribe()
    }

    /// Send to every connected client. Returns the number of receivers.
    pub fn broadcast(&self, msg: ServerMessage) -> usize {
        // No subscribers is not an error
        self.tx.send(msg).unwrap_or(0)
    }
}

impl Default for SocketLayer {
    fn default() -> Self {
        Self::new()
    }
}

/// WebSocket implementation of [`RealtimeApi`]
pub struct SyncApi {
    store: Arc<dyn ModelStore>,
    sockets: SocketLayer,
}

impl SyncApi {
    pub fn new(store: Arc<dyn ModelStore>, sockets: SocketLayer) -> Self {
        Self { store, sockets }
    }
}

#[async_trait]
impl RealtimeApi for SyncApi {
    async fn setup(&self) -> Result<()> {
        let snapshot = self
            .store
            .current()
            .await
            .context("Realtime API requires an initialized model store")?;
        self.sockets.activate();
        info!("Realtime sync live at model version {}", snapshot.version);
        Ok(())
    }
}
