//! HTTP handlers

pub mod upload;

pub use crate::config::AppState;

pub use upload::{upload_file, UploadRequest, UploadedFile};

/// GET /health
pub async fn health_check() -> &'static str {
    "OK"
}
