//! Federated model coordination server
//!
//! Wires a model store, a realtime sync channel and a bulk data ingestion
//! endpoint together, and only opens the listening socket once the store and
//! the realtime protocol are both up.

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod realtime;
pub mod router;
pub mod store;

use tracing::info;
use tracing_subscriber::EnvFilter;

pub use bootstrap::{setup, Bootstrap, BootstrapError, Serving};
pub use config::{AppState, ServerConfig};
pub use models::FederatedModel;

/// Install the global fmt subscriber. Safe to call more than once.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter).finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        // Already set, ignore
    }
}

pub async fn run(model: FederatedModel, config: ServerConfig) -> anyhow::Result<()> {
    init_tracing();

    info!("=== Fedsync Server ===");
    info!("Data directory: {:?}", config.data_dir);
    info!("Model: {} ({} variables)", model.name, model.vars.len());

    let serving = setup(model, config).await?;
    serving.run().await?;

    Ok(())
}
