use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A named tensor of model weights
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorData {
    pub name: String,
    pub shape: Vec<usize>,
    pub values: Vec<f32>,
}

impl TensorData {
    pub fn new(name: impl Into<String>, shape: Vec<usize>, values: Vec<f32>) -> Self {
        Self {
            name: name.into(),
            shape,
            values,
        }
    }

    /// Number of elements the shape describes, `None` if it overflows `usize`
    pub fn element_count(&self) -> Option<usize> {
        self.shape.iter().try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
    }

    /// True when the value buffer matches the declared shape
    pub fn is_consistent(&self) -> bool {
        self.element_count() == Some(self.values.len())
    }
}

/// The model descriptor handed to the store at startup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FederatedModel {
    pub name: String,
    #[serde(default)]
    pub vars: Vec<TensorData>,
}

impl FederatedModel {
    pub fn new(name: impl Into<String>, vars: Vec<TensorData>) -> Self {
        Self {
            name: name.into(),
            vars,
        }
    }

    /// Read a JSON model descriptor from disk
    pub async fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read model file {:?}", path))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse model file {:?}", path))
    }
}

/// A persisted model version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSnapshot {
    pub version: String,
    pub vars: Vec<TensorData>,
}

/// Weights trained by a client against a given model version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientUpdate {
    pub client_id: String,
    pub model_version: String,
    pub num_examples: u64,
    pub vars: Vec<TensorData>,
}
