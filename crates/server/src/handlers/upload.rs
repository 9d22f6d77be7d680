//! Bulk data ingestion
//!
//! `POST /data` takes a multipart body with a `file` part and stores it as
//! `<files_dir>/<uuid>_<original name>`.

use axum::extract::{FromRequest, Multipart, Request, State};
use bytes::Bytes;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncRead, AsyncWriteExt};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::config::AppState;
use crate::error::{Error, Result};

pub const UPLOAD_OK_MESSAGE: &str = "File uploaded successfully";
const FILE_FIELD: &str = "file";

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub data: Bytes,
}

/// Multipart body reduced to the one part the endpoint cares about
#[derive(Debug, Default)]
pub struct UploadRequest {
    pub file: Option<UploadedFile>,
}

impl<S> FromRequest<S> for UploadRequest
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request(req: Request, state: &S) -> Result<Self> {
        // A body that isn't multipart carries no file
        let mut multipart = match Multipart::from_request(req, state).await {
            Ok(multipart) => multipart,
            Err(rejection) => {
                debug!("Not a multipart body: {}", rejection);
                return Ok(Self::default());
            }
        };

        while let Some(field) = multipart.next_field().await.map_err(|e| {
            error!("Failed to read multipart field: {}", e);
            Error::Multipart(e)
        })? {
            if field.name() != Some(FILE_FIELD) {
                continue;
            }

            let filename = field.file_name().unwrap_or("unnamed").to_string();
            let data = field.bytes().await.map_err(|e| {
                error!("Failed to read file data: {}", e);
                Error::Multipart(e)
            })?;

            return Ok(Self {
                file: Some(UploadedFile { filename, data }),
            });
        }

        Ok(Self::default())
    }
}

/// POST /data
pub async fn upload_file(
    State(state): State<AppState>,
    upload: UploadRequest,
) -> Result<&'static str> {
    let file = upload.file.ok_or(Error::MissingFile)?;

    let files_dir = state.config.files_dir();
    if ensure_ingestion_dir(&files_dir).await? {
        info!("Created ingestion directory {:?}", files_dir);
    }

    let path = persist_upload(&files_dir, &file).await?;
    info!("Stored upload {:?} ({} bytes)", path, file.data.len());

    Ok(UPLOAD_OK_MESSAGE)
}

/// Make sure the ingestion directory exists. Returns true if this call created it.
///
/// Creation tolerates a concurrent creator winning the race.
pub async fn ensure_ingestion_dir(dir: &Path) -> io::Result<bool> {
    if fs::try_exists(dir).await? {
        return Ok(false);
    }

    match fs::create_dir_all(dir).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(e),
    }
}

/// `<uuid>_<name>`, keeping only the last path component of `original`
pub fn stored_file_name(original: &str) -> String {
    let name = original
        .rsplit(['/', '\\'])
        .next()
        .filter(|s| !s.is_empty() && *s != "." && *s != "..")
        .unwrap_or("unnamed");

    format!("{}_{}", Uuid::new_v4(), name)
}

/// Write the upload under `dir`. Never overwrites an existing file.
pub async fn persist_upload(dir: &Path, file: &UploadedFile) -> io::Result<PathBuf> {
    let path = dir.join(stored_file_name(&file.filename));
    write_new_file(&path, &mut &file.data[..]).await?;
    Ok(path)
}

/// Create `path` and fill it from `src`. A failed write leaves nothing behind.
async fn write_new_file<R>(path: &Path, src: &mut R) -> io::Result<u64>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut out = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;

    let written = async {
        let n = tokio::io::copy(src, &mut out).await?;
        out.flush().await?;
        out.sync_all().await?;
        Ok::<_, io::Error>(n)
    }
    .await;

    if let Err(e) = &written {
        error!("Write to {:?} failed, removing partial file: {}", path, e);
        drop(out);
        if let Err(rm) = fs::remove_file(path).await {
            error!("Failed to remove partial file {:?}: {}", path, rm);
        }
    }

    written
}
