use async_trait::async_trait;
use bytes::Bytes;

use crate::error::BlobError;
use crate::types::BlobMetadata;

/// Pluggable storage for image bytes.
///
/// Blobs are addressed by caller-chosen ids (a photo id, or the photo id
/// with a `_thumb` suffix). Writing to an existing id replaces the blob.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store a blob under `id` and return its metadata.
    ///
    /// The store computes the size and a `SHA-256` checksum.
    async fn put(
        &self,
        id: &str,
        content_type: &str,
        data: Bytes,
    ) -> Result<BlobMetadata, BlobError>;

    /// Retrieve a blob by id, returning both metadata and content.
    async fn get(&self, id: &str) -> Result<Option<(BlobMetadata, Bytes)>, BlobError>;

    /// Retrieve only the metadata for a blob.
    async fn get_metadata(&self, id: &str) -> Result<Option<BlobMetadata>, BlobError>;

    /// Delete a blob by id. Returns `true` if the blob existed.
    async fn delete(&self, id: &str) -> Result<bool, BlobError>;
}

/// Reject ids that could escape a storage root or collide with sidecar files.
pub(crate) fn validate_id(id: &str) -> Result<(), BlobError> {
    let ok = !id.is_empty()
        && id.len() <= 128
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if ok {
        Ok(())
    } else {
        Err(BlobError::InvalidId(id.to_owned()))
    }
}
