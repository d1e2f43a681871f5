use std::sync::Arc;

use farmgate_blob::{BlobStore, FsBlobStore, MemoryBlobStore};
use tracing::info;

use crate::config::BlobConfig;
use crate::error::ServerError;

/// Create the image store from the given configuration.
///
/// `max_size` caps individual blobs; it should match the moderation image
/// limit.
pub fn create_blob_store(
    config: &BlobConfig,
    max_size: u64,
) -> Result<Arc<dyn BlobStore>, ServerError> {
    let store: Arc<dyn BlobStore> = match config.backend.as_str() {
        "memory" => Arc::new(MemoryBlobStore::new()),
        "fs" => {
            info!(path = %config.path, "storing photos on disk");
            Arc::new(FsBlobStore::new(&config.path).with_max_size(max_size))
        }
        other => {
            return Err(ServerError::Config(format!(
                "unsupported blob backend: {other}"
            )));
        }
    };
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backends() {
        assert!(create_blob_store(&BlobConfig::default(), 1024).is_ok());
        let fs = BlobConfig {
            backend: "fs".into(),
            path: "/tmp/farmgate-photos".into(),
        };
        assert!(create_blob_store(&fs, 1024).is_ok());
        let s3 = BlobConfig {
            backend: "s3".into(),
            ..BlobConfig::default()
        };
        assert!(matches!(
            create_blob_store(&s3, 1024),
            Err(ServerError::Config(_))
        ));
    }
}
