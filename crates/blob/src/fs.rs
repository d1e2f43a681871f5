use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::BlobError;
use crate::store::{BlobStore, validate_id};
use crate::types::BlobMetadata;

/// Filesystem-backed [`BlobStore`].
///
/// Each blob is one file named by its id under the root directory, with a
/// `<id>.meta.json` sidecar holding its [`BlobMetadata`]. Writes go to a
/// temporary file first and are renamed into place.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
    max_size: Option<u64>,
}

impl FsBlobStore {
    /// Create a store rooted at `root`. The directory is created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            max_size: None,
        }
    }

    /// Reject blobs larger than `max_size` bytes.
    #[must_use]
    pub fn with_max_size(mut self, max_size: u64) -> Self {
        self.max_size = Some(max_size);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn data_path(&self, id: &str) -> PathBuf {
        self.root.join(id)
    }

    fn meta_path(&self, id: &str) -> PathBuf {
        self.root.join(format!("{id}.meta.json"))
    }

    async fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), BlobError> {
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, contents).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    async fn remove_if_exists(path: &Path) -> Result<bool, BlobError> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
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

        tokio::fs::create_dir_all(&self.root).await?;

        let meta = BlobMetadata::describe(id, content_type, &data);
        let meta_json =
            serde_json::to_vec(&meta).map_err(|e| BlobError::Metadata(e.to_string()))?;

        Self::write_atomic(&self.data_path(id), &data).await?;
        Self::write_atomic(&self.meta_path(id), &meta_json).await?;

        tracing::debug!(blob_id = %id, size, "blob written");
        Ok(meta)
    }

    async fn get(&self, id: &str) -> Result<Option<(BlobMetadata, Bytes)>, BlobError> {
        let Some(meta) = self.get_metadata(id).await? else {
            return Ok(None);
        };
        match tokio::fs::read(self.data_path(id)).await {
            Ok(data) => Ok(Some((meta, Bytes::from(data)))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_metadata(&self, id: &str) -> Result<Option<BlobMetadata>, BlobError> {
        validate_id(id)?;
        let raw = match tokio::fs::read(self.meta_path(id)).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&raw)
            .map(Some)
            .map_err(|e| BlobError::Metadata(e.to_string()))
    }

    async fn delete(&self, id: &str) -> Result<bool, BlobError> {
        validate_id(id)?;
        let existed = Self::remove_if_exists(&self.data_path(id)).await?;
        Self::remove_if_exists(&self.meta_path(id)).await?;
        Ok(existed)
    }
}
