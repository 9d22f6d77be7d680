//! Model storage
//!
//! The server only talks to storage through [`ModelStore`]. `setup` must
//! finish before any realtime traffic is allowed.

pub mod json_store;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{ClientUpdate, FederatedModel, ModelSnapshot};

pub use json_store::JsonModelStore;

#[async_trait]
pub trait ModelStore: Send + Sync {
    /// Load the latest persisted version, seeding it from `model` on first run.
    async fn setup(&self, model: &FederatedModel) -> Result<()>;

    /// The version currently served to clients.
    async fn current(&self) -> Result<ModelSnapshot>;

    /// Persist a client update, returning how many updates the version now has.
    async fn put_update(&self, update: ClientUpdate) -> Result<usize>;
}
