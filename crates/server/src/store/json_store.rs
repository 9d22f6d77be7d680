//! JSON-file model store
//!
//! Layout under the data root:
//! ```text
//! models/<version>.json            # one snapshot per version
//! updates/<version>/<uuid>.json    # client updates against that version
//! ```
//! Writes go to a temp file first and are renamed into place.

use crate::models::{ClientUpdate, FederatedModel, ModelSnapshot};
use crate::store::ModelStore;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

pub struct JsonModelStore {
    models_dir: PathBuf,
    updates_dir: PathBuf,
    current: RwLock<Option<ModelSnapshot>>,
}

impl JsonModelStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        let data_dir = data_dir.as_ref();
        Self {
            models_dir: data_dir.join("models"),
            updates_dir: data_dir.join("updates"),
            current: RwLock::new(None),
        }
    }

    fn model_path(&self, version: &str) -> PathBuf {
        self.models_dir.join(format!("{}.json", version))
    }

    fn version_updates_dir(&self, version: &str) -> PathBuf {
        self.updates_dir.join(version)
    }

    /// Versions are zero-padded millisecond timestamps, so they sort lexically.
    fn new_version() -> String {
        format!("{:016}", Utc::now().timestamp_millis())
    }

    /// Find the newest snapshot on disk
    async fn latest_version(&self) -> Result<Option<String>> {
        let mut entries = fs::read_dir(&self.models_dir)
            .await
            .with_context(|| format!("Failed to read {:?}", self.models_dir))?;
        let mut latest: Option<String> = None;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if latest.as_deref().map_or(true, |l| stem > l) {
                    latest = Some(stem.to_string());
                }
            }
        }

        Ok(latest)
    }

    async fn load_snapshot(&self, version: &str) -> Result<ModelSnapshot> {
        let path = self.model_path(version);
        let content = fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read model {:?}", path))?;
        let snapshot: ModelSnapshot = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse model {} JSON", version))?;
        Ok(snapshot)
    }

    /// Count stored updates for a version
    async fn update_count(&self, version: &str) -> Result<usize> {
        let dir = self.version_updates_dir(version);
        if !fs::try_exists(&dir).await? {
            return Ok(0);
        }
        let mut entries = fs::read_dir(&dir).await?;
        let mut count = 0;
        while let Some(entry) = entries.next_entry().await? {
            if entry.path().extension().and_then(|s| s.to_str()) == Some("json") {
                count += 1;
            }
        }
        Ok(count)
    }
}

/// Write JSON to a temp file, then rename it over `path`
async fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let temp_path = path.with_extension("tmp");
    let json = serde_json::to_string_pretty(value)?;
    fs::write(&temp_path, json)
        .await
        .with_context(|| format!("Failed to write {:?}", temp_path))?;
    fs::rename(&temp_path, path)
        .await
        .with_context(|| format!("Failed to move {:?} into place", path))?;
    Ok(())
}

#[async_trait]
impl ModelStore for JsonModelStore {
    async fn setup(&self, model: &FederatedModel) -> Result<()> {
        fs::create_dir_all(&self.models_dir).await?;
        fs::create_dir_all(&self.updates_dir).await?;

        let snapshot = match self.latest_version().await? {
            Some(version) => {
                let snapshot = self.load_snapshot(&version).await?;
                info!("Loaded model version {} from disk", version);
                snapshot
            }
            None => {
                for var in model.vars.iter().filter(|v| !v.is_consistent()) {
                    warn!(
                        "Variable {} has {} values for shape {:?}",
                        var.name,
                        var.values.len(),
                        var.shape
                    );
                }
                let snapshot = ModelSnapshot {
                    version: Self::new_version(),
                    vars: model.vars.clone(),
                };
                write_json_atomic(&self.model_path(&snapshot.version), &snapshot).await?;
                info!(
                    "Seeded model {} as version {}",
                    model.name, snapshot.version
                );
                snapshot
            }
        };

        *self.current.write().await = Some(snapshot);
        Ok(())
    }

    async fn current(&self) -> Result<ModelSnapshot> {
        self.current
            .read()
            .await
            .clone()
            .context("Model store is not initialized")
    }

    async fn put_update(&self, update: ClientUpdate) -> Result<usize> {
        let current = self.current().await?;
        if update.model_version != current.version {
            bail!(
                "Update targets version {} but current version is {}",
                update.model_version,
                current.version
            );
        }

        let dir = self.version_updates_dir(&current.version);
        fs::create_dir_all(&dir).await?;
        let path = dir.join(format!("{}.json", Uuid::new_v4()));
        write_json_atomic(&path, &update).await?;

        let count = self.update_count(&current.version).await?;
        info!(
            "Stored update from {} for version {} ({} total)",
            update.client_id, current.version, count
        );
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TensorData;
    use tempfile::TempDir;

    fn model() -> FederatedModel {
        FederatedModel::new(
            "mnist",
            vec![TensorData::new("dense/bias", vec![2], vec![0.5, -0.5])],
        )
    }

    fn update_for(version: &str, client: &str) -> ClientUpdate {
        ClientUpdate {
            client_id: client.to_string(),
            model_version: version.to_string(),
            num_examples: 32,
            vars: vec![TensorData::new("dense/bias", vec![2], vec![0.4, -0.4])],
        }
    }

    #[tokio::test]
    async fn test_current_before_setup_fails() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonModelStore::new(temp_dir.path());
        assert!(store.current().await.is_err());
    }

    #[tokio::test]
    async fn test_setup_seeds_first_version() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonModelStore::new(temp_dir.path());
        store.setup(&model()).await.unwrap();

        let snapshot = store.current().await.unwrap();
        assert_eq!(snapshot.vars, model().vars);
        assert!(temp_dir
            .path()
            .join("models")
            .join(format!("{}.json", snapshot.version))
            .exists());
    }

    #[tokio::test]
    async fn test_setup_reloads_latest_version() {
        let temp_dir = TempDir::new().unwrap();
        let seeded = {
            let store = JsonModelStore::new(temp_dir.path());
            store.setup(&model()).await.unwrap();
            store.current().await.unwrap()
        };

        // A different descriptor must not replace the persisted state
        let other = FederatedModel::new("other", vec![]);
        let store = JsonModelStore::new(temp_dir.path());
        store.setup(&other).await.unwrap();
        assert_eq!(store.current().await.unwrap(), seeded);
    }

    #[tokio::test]
    async fn test_setup_tolerates_overflowing_shape() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonModelStore::new(temp_dir.path());
        let model = FederatedModel::new(
            "m",
            vec![TensorData::new("w", vec![usize::MAX, 2], vec![])],
        );

        store.setup(&model).await.unwrap();
        assert_eq!(store.current().await.unwrap().vars, model.vars);
    }

    #[tokio::test]
    async fn test_put_update_counts_per_version() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonModelStore::new(temp_dir.path());
        store.setup(&model()).await.unwrap();
        let version = store.current().await.unwrap().version;

        assert_eq!(store.put_update(update_for(&version, "a")).await.unwrap(), 1);
        assert_eq!(store.put_update(update_for(&version, "b")).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_put_update_rejects_stale_version() {
        let temp_dir = TempDir::new().unwrap();
        let store = JsonModelStore::new(temp_dir.path());
        store.setup(&model()).await.unwrap();

        let result = store.put_update(update_for("0000000000000001", "a")).await;
        assert!(result.is_err());
        assert!(!temp_dir.path().join("updates").join("0000000000000001").exists());
    }
}
