//! Server configuration

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use crate::realtime::SocketLayer;
use crate::store::ModelStore;

/// Default service port
pub const DEFAULT_PORT: u16 = 3000;

/// Subdirectory of the data root that receives uploaded files
pub const FILES_SUBDIR: &str = "files";

/// Configuration for the coordination server
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Root for everything the server persists
    pub data_dir: PathBuf,
    /// Address to bind
    pub host: IpAddr,
    /// Port to bind (0 picks an ephemeral port)
    pub port: u16,
    /// Max upload body size in MB
    pub max_upload_mb: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            data_dir: std::env::var("FEDSYNC_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("fedsync_data")),
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: std::env::var("FEDSYNC_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_PORT),
            max_upload_mb: 50,
        }
    }
}

impl ServerConfig {
    /// Create config rooted at a custom data directory
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Self::default()
        }
    }

    /// Ingestion directory for uploads
    pub fn files_dir(&self) -> PathBuf {
        self.data_dir.join(FILES_SUBDIR)
    }

    /// Model snapshot directory
    pub fn models_dir(&self) -> PathBuf {
        self.data_dir.join("models")
    }

    /// Client update directory
    pub fn updates_dir(&self) -> PathBuf {
        self.data_dir.join("updates")
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }
}

/// App state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: ServerConfig,
    pub store: Arc<dyn ModelStore>,
    pub sockets: SocketLayer,
}
