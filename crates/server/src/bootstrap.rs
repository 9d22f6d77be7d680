//! Server startup sequencing
//!
//! Startup is a chain of stages, each only reachable from the one before it:
//!
//! ```text
//! Bootstrap --init_store--> StoreReady --init_api--> ApiReady --listen--> Serving
//! ```
//!
//! The HTTP application is built in [`Bootstrap`], but no socket is bound until
//! [`ApiReady::listen`], so clients can never observe a store that has not
//! loaded its initial model.

use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::config::{AppState, ServerConfig};
use crate::models::FederatedModel;
use crate::realtime::{RealtimeApi, SocketLayer, SyncApi};
use crate::router::router;
use crate::store::{JsonModelStore, ModelStore};

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("model store setup failed: {0:#}")]
    Store(anyhow::Error),
    #[error("realtime API setup failed: {0:#}")]
    Api(anyhow::Error),
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Everything the server owns for the life of the process
struct Components {
    config: ServerConfig,
    app: Router,
    store: Arc<dyn ModelStore>,
    api: Arc<dyn RealtimeApi>,
}

/// Application built, nothing initialized
pub struct Bootstrap {
    inner: Components,
}

/// Model store loaded
pub struct StoreReady {
    inner: Components,
}

/// Realtime protocol live
pub struct ApiReady {
    inner: Components,
}

/// Listener bound, ready to serve
pub struct Serving {
    inner: Components,
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl Bootstrap {
    /// Build the default stack: a JSON store under `config.data_dir` and the
    /// WebSocket sync API.
    pub fn new(config: ServerConfig) -> Self {
        let store: Arc<dyn ModelStore> = Arc::new(JsonModelStore::new(&config.data_dir));
        let sockets = SocketLayer::new();
        let api = Arc::new(SyncApi::new(store.clone(), sockets.clone()));
        Self::with_components(config, store, api, sockets)
    }

    pub fn with_components(
        config: ServerConfig,
        store: Arc<dyn ModelStore>,
        api: Arc<dyn RealtimeApi>,
        sockets: SocketLayer,
    ) -> Self {
        let app = router(AppState {
            config: config.clone(),
            store: store.clone(),
            sockets,
        });

        Self {
            inner: Components {
                config,
                app,
                store,
                api,
            },
        }
    }

    /// The HTTP application, for driving requests without a socket
    pub fn app(&self) -> Router {
        self.inner.app.clone()
    }

    pub async fn init_store(self, model: &FederatedModel) -> Result<StoreReady, BootstrapError> {
        info!("Initializing model store for {}", model.name);
        self.inner.store.setup(model).await.map_err(|e| {
            error!("Model store setup failed: {:#}", e);
            BootstrapError::Store(e)
        })?;
        info!("Model store ready");
        Ok(StoreReady { inner: self.inner })
    }
}

impl StoreReady {
    pub async fn init_api(self) -> Result<ApiReady, BootstrapError> {
        info!("Initializing realtime API");
        self.inner.api.setup().await.map_err(|e| {
            error!("Realtime API setup failed: {:#}", e);
            BootstrapError::Api(e)
        })?;
        info!("Realtime API ready");
        Ok(ApiReady { inner: self.inner })
    }
}

impl ApiReady {
    pub async fn listen(self) -> Result<Serving, BootstrapError> {
        let addr = self.inner.config.socket_addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| BootstrapError::Bind { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| BootstrapError::Bind { addr, source })?;

        info!("listening on {}", local_addr);

        Ok(Serving {
            inner: self.inner,
            listener,
            local_addr,
        })
    }
}

impl Serving {
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn store(&self) -> &Arc<dyn ModelStore> {
        &self.inner.store
    }

    pub async fn run(self) -> Result<(), BootstrapError> {
        // Keep the API alive for as long as we serve
        let _api = self.inner.api;
        axum::serve(self.listener, self.inner.app)
            .await
            .map_err(BootstrapError::Serve)
    }
}

/// Bring the server up: store, then realtime API, then the listening socket.
pub async fn setup(model: FederatedModel, config: ServerConfig) -> Result<Serving, BootstrapError> {
    Bootstrap::new(config)
        .init_store(&model)
        .await?
        .init_api()
        .await?
        .listen()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use std::net::{IpAddr, Ipv4Addr};
    use std::sync::Mutex;

    use crate::models::{ClientUpdate, ModelSnapshot};

    type Events = Arc<Mutex<Vec<&'static str>>>;

    struct RecordingStore {
        events: Events,
        fail: bool,
    }

    #[async_trait]
    impl ModelStore for RecordingStore {
        async fn setup(&self, _model: &FederatedModel) -> Result<()> {
            tokio::task::yield_now().await;
            if self.fail {
                bail!("disk unavailable");
            }
            self.events.lock().unwrap().push("store");
            Ok(())
        }

        async fn current(&self) -> Result<ModelSnapshot> {
            Ok(ModelSnapshot {
                version: "v1".into(),
                vars: vec![],
            })
        }

        async fn put_update(&self, _update: ClientUpdate) -> Result<usize> {
            Ok(1)
        }
    }

    struct RecordingApi {
        events: Events,
        fail: bool,
    }

    #[async_trait]
    impl RealtimeApi for RecordingApi {
        async fn setup(&self) -> Result<()> {
            if self.fail {
                bail!("protocol refused to start");
            }
            self.events.lock().unwrap().push("api");
            Ok(())
        }
    }

    fn local_config() -> ServerConfig {
        let mut config = ServerConfig::with_data_dir("unused");
        config.host = IpAddr::V4(Ipv4Addr::LOCALHOST);
        config.port = 0;
        config
    }

    fn bootstrap(events: &Events, store_fails: bool, api_fails: bool) -> Bootstrap {
        Bootstrap::with_components(
            local_config(),
            Arc::new(RecordingStore {
                events: events.clone(),
                fail: store_fails,
            }),
            Arc::new(RecordingApi {
                events: events.clone(),
                fail: api_fails,
            }),
            SocketLayer::new(),
        )
    }

    #[tokio::test]
    async fn test_stages_run_in_order() {
        let events: Events = Arc::default();
        let model = FederatedModel::new("m", vec![]);

        let serving = bootstrap(&events, false, false)
            .init_store(&model)
            .await
            .unwrap()
            .init_api()
            .await
            .unwrap()
            .listen()
            .await
            .unwrap();

        assert_eq!(*events.lock().unwrap(), vec!["store", "api"]);
        assert_ne!(serving.local_addr().port(), 0);
    }

    #[tokio::test]
    async fn test_store_failure_skips_api() {
        let events: Events = Arc::default();
        let model = FederatedModel::new("m", vec![]);

        let result = bootstrap(&events, true, false).init_store(&model).await;

        assert!(matches!(result, Err(BootstrapError::Store(_))));
        assert!(events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_api_failure_stops_before_listen() {
        let events: Events = Arc::default();
        let model = FederatedModel::new("m", vec![]);

        let store_ready = bootstrap(&events, false, true)
            .init_store(&model)
            .await
            .unwrap();
        let result = store_ready.init_api().await;

        assert!(matches!(result, Err(BootstrapError::Api(_))));
        assert_eq!(*events.lock().unwrap(), vec!["store"]);
    }

    #[test]
    fn test_error_messages_carry_cause() {
        let err = BootstrapError::Store(anyhow::anyhow!("disk unavailable"));
        assert_eq!(err.to_string(), "model store setup failed: disk unavailable");
    }
}
