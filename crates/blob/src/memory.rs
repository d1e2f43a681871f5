use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

use crate::error::BlobError;
use crate::store::{BlobStore, validate_id};
use crate::types::BlobMetadata;

/// In-memory [`BlobStore`] for tests and development.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: DashMap<String, (BlobMetadata, Bytes)>,
    max_size: Option<u64>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject blobs larger than `max_size` bytes.
    #[must_use]
    pub fn with_max_size(mut self, max_size: u64) -> Self {
        self.max_size = Some(max_size);
        self
    }

    /// Number of stored blobs.
    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(
        &self,
        id: &str,
        content_type: &str,
        data: Bytes,
    ) -> Result<BlobMetadata, BlobError> {
        validate_id(id)?;
        let size = data.len() as u64;
        if let Some(limit) = self.max_size
            && size > limit
        {
            return Err(BlobError::TooLarge { size, limit });
        }
        let meta = BlobMetadata::describe(id, content_type, &data);
        self.blobs.insert(id.to_owned(), (meta.clone(), data));
        Ok(meta)
    }

    async fn get(&self, id: &str) -> Result<Option<(BlobMetadata, Bytes)>, BlobError> {
        Ok(self.blobs.get(id).map(|e| e.value().clone()))
    }

    async fn get_metadata(&self, id: &str) -> Result<Option<BlobMetadata>, BlobError> {
        Ok(self.blobs.get(id).map(|e| e.value().0.clone()))
    }

    async fn delete(&self, id: &str) -> Result<bool, BlobError> {
        Ok(self.blobs.remove(id).is_some())
    }
}
