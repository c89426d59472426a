//! Collaborator seams: blob storage, the secure parameter store and the
//! structured-record store.
//!
//! The pipeline only ever talks to these traits. [`fs`] backs them with a
//! local directory tree for the CLI; [`memory`] keeps everything in process
//! for tests and embedding.

pub mod fs;
pub mod memory;

pub use fs::{FileParameterStore, FsBlobStore, FsRecordStore};
pub use memory::{MemoryBlobStore, MemoryParameterStore, MemoryRecordStore};

use crate::error::StoreError;
use crate::pipeline::response::AttributeRecord;
use async_trait::async_trait;
use std::sync::Arc;

/// Suffix appended to the source key for the raw-response blob.
pub const RESPONSE_SUFFIX: &str = "-Response.json";

/// Media type of the raw-response blob.
pub const RESPONSE_MEDIA_TYPE: &str = "application/json";

/// Key under which the raw response for `source_key` is written.
pub fn response_key(source_key: &str) -> String {
    format!("{source_key}{RESPONSE_SUFFIX}")
}

/// Bytes plus their declared media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub bytes: Arc<[u8]>,
    pub media_type: String,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Blob, StoreError>;

    async fn put(&self, key: &str, bytes: &[u8], media_type: &str) -> Result<(), StoreError>;
}

#[async_trait]
pub trait ParameterStore: Send + Sync {
    /// The stored extraction prompt; empty when none is configured.
    async fn extraction_prompt(&self) -> Result<String, StoreError>;
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Store `record` under `key`, replacing any previous record.
    async fn put(&self, key: &str, record: &AttributeRecord) -> Result<(), StoreError>;
}
