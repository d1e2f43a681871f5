use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Metadata for a stored blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobMetadata {
    /// Blob identifier.
    pub id: String,
    /// MIME content type (e.g. `"image/jpeg"`).
    pub content_type: String,
    /// Size in bytes.
    pub size_bytes: u64,
    /// `SHA-256` hex digest of the blob content.
    pub checksum_sha256: String,
    /// When the blob was written.
    pub created_at: DateTime<Utc>,
}

impl BlobMetadata {
    pub(crate) fn describe(id: &str, content_type: &str, data: &[u8]) -> Self {
        Self {
            id: id.to_owned(),
            content_type: content_type.to_owned(),
            size_bytes: data.len() as u64,
            checksum_sha256: sha256_hex(data),
            created_at: Utc::now(),
        }
    }
}

pub(crate) fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_computes_size_and_checksum() {
        let meta = BlobMetadata::describe("photo_1", "image/png", b"abc");
        assert_eq!(meta.size_bytes, 3);
        assert_eq!(
            meta.checksum_sha256,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
