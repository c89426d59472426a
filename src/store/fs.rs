//! Local-filesystem stores used by the CLI.
//!
//! Keys are relative paths under a root directory. A key that is absolute or
//! climbs out of the root with `..` is rejected with
//! [`StoreError::InvalidKey`]. Writes go to a temp file in the target
//! directory and are renamed into place, so readers never see a partial file.

use super::{Blob, BlobStore, ParameterStore, RecordStore};
use crate::error::StoreError;
use crate::pipeline::response::AttributeRecord;
use async_trait::async_trait;
use std::io::{ErrorKind, Write};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Media type for a file, from its extension.
pub fn media_type_for_path(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "csv" => "text/csv",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xls" => "application/vnd.ms-excel",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "html" | "htm" => "text/html",
        "txt" => "text/plain",
        "md" => "text/markdown",
        "json" => "application/json",
        _ => "application/octet-stream",
    }
}

/// Join `key` onto `root`, refusing anything that would leave `root`.
fn resolve_under(root: &Path, key: &str) -> Result<PathBuf, StoreError> {
    let invalid = |reason: &str| StoreError::InvalidKey {
        key: key.to_string(),
        reason: reason.to_string(),
    };
    if key.trim().is_empty() {
        return Err(invalid("empty key"));
    }
    let rel = Path::new(key);
    for component in rel.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir => return Err(invalid("'..' is not allowed")),
            Component::RootDir | Component::Prefix(_) => {
                return Err(invalid("absolute paths are not allowed"))
            }
        }
    }
    Ok(root.join(rel))
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Write `bytes` to `path` via a temp file in the same directory.
async fn write_atomic(path: PathBuf, bytes: Vec<u8>) -> Result<(), StoreError> {
    tokio::task::spawn_blocking(move || {
        let parent = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        std::fs::create_dir_all(&parent).map_err(|e| io_error(&parent, e))?;

        let mut tmp = tempfile::NamedTempFile::new_in(&parent).map_err(|e| io_error(&parent, e))?;
        tmp.write_all(&bytes).map_err(|e| io_error(tmp.path(), e))?;
        tmp.persist(&path).map_err(|e| io_error(&path, e.error))?;
        Ok(())
    })
    .await
    .map_err(|e| StoreError::Backend(format!("write task failed: {e}")))?
}

// ── Blobs ────────────────────────────────────────────────────────────────

/// Source documents and raw responses as files under `root`.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn get(&self, key: &str) -> Result<Blob, StoreError> {
        let path = resolve_under(&self.root, key)?;
        let bytes = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
            ErrorKind::NotFound => StoreError::NotFound { key: key.to_string() },
            _ => io_error(&path, e),
        })?;
        debug!("Read {} ({} bytes)", path.display(), bytes.len());
        Ok(Blob {
            bytes: bytes.into(),
            media_type: media_type_for_path(&path).to_string(),
        })
    }

    async fn put(&self, key: &str, bytes: &[u8], media_type: &str) -> Result<(), StoreError> {
        let path = resolve_under(&self.root, key)?;
        debug!("Writing {} ({}, {} bytes)", path.display(), media_type, bytes.len());
        write_atomic(path, bytes.to_vec()).await
    }
}

// ── Parameters ───────────────────────────────────────────────────────────

/// Extraction prompt read from a single file. A missing file means no prompt.
#[derive(Debug, Clone)]
pub struct FileParameterStore {
    path: Option<PathBuf>,
}

impl FileParameterStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// A store that never yields a prompt.
    pub fn none() -> Self {
        Self { path: None }
    }
}

#[async_trait]
impl ParameterStore for FileParameterStore {
    async fn extraction_prompt(&self) -> Result<String, StoreError> {
        let Some(path) = &self.path else {
            return Ok(String::new());
        };
        match tokio::fs::read_to_string(path).await {
            Ok(text) => Ok(text.trim().to_string()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("No prompt parameter at {}", path.display());
                Ok(String::new())
            }
            Err(e) => Err(io_error(path, e)),
        }
    }
}

// ── Records ──────────────────────────────────────────────────────────────

/// One pretty-printed JSON file per key: `<root>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FsRecordStore {
    root: PathBuf,
}

impl FsRecordStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn record_path(&self, key: &str) -> Result<PathBuf, StoreError> {
        resolve_under(&self.root, &format!("{key}.json"))
    }
}

#[async_trait]
impl RecordStore for FsRecordStore {
    async fn put(&self, key: &str, record: &AttributeRecord) -> Result<(), StoreError> {
        let path = self.record_path(key)?;
        let mut json = serde_json::to_vec_pretty(record)
            .map_err(|e| StoreError::Backend(format!("record serialisation: {e}")))?;
        json.push(b'\n');
        write_atomic(path, json).await
    }
}
