//! In-process stores for tests and embedding.

use super::{Blob, BlobStore, ParameterStore, RecordStore};
use crate::error::StoreError;
use crate::pipeline::response::AttributeRecord;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Blob store backed by a `HashMap`.
#[derive(Debug, Default, Clone)]
pub struct MemoryBlobStore {
    blobs: Arc<RwLock<HashMap<String, Blob>>>,
    puts: Arc<RwLock<usize>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a blob without counting it as a write.
    pub async fn insert(
        &self,
        key: impl Into<String>,
        bytes: impl Into<Arc<[u8]>>,
        media_type: impl Into<String>,
    ) {
        self.blobs.write().await.insert(
            key.into(),
            Blob {
                bytes: bytes.into(),
                media_type: media_type.into(),
            },
        );
    }

    pub async fn snapshot(&self, key: &str) -> Option<Blob> {
        self.blobs.read().await.get(key).cloned()
    }

    /// Number of `put` calls so far.
    pub async fn put_count(&self) -> usize {
        *self.puts.read().await
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get(&self, key: &str) -> Result<Blob, StoreError> {
        self.blobs
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound { key: key.to_string() })
    }

    async fn put(&self, key: &str, bytes: &[u8], media_type: &str) -> Result<(), StoreError> {
        self.insert(key, bytes.to_vec(), media_type).await;
        *self.puts.write().await += 1;
        debug!("MemoryBlobStore: wrote {} ({} bytes)", key, bytes.len());
        Ok(())
    }
}

/// Parameter store holding a fixed prompt.
#[derive(Debug, Default, Clone)]
pub struct MemoryParameterStore {
    prompt: String,
}

impl MemoryParameterStore {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ParameterStore for MemoryParameterStore {
    async fn extraction_prompt(&self) -> Result<String, StoreError> {
        Ok(self.prompt.clone())
    }
}

/// Record store backed by a `HashMap`; `put` overwrites.
#[derive(Debug, Default, Clone)]
pub struct MemoryRecordStore {
    records: Arc<RwLock<HashMap<String, AttributeRecord>>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &str) -> Option<AttributeRecord> {
        self.records.read().await.get(key).cloned()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn put(&self, key: &str, record: &AttributeRecord) -> Result<(), StoreError> {
        self.records
            .write()
            .await
            .insert(key.to_string(), record.clone());
        Ok(())
    }
}
