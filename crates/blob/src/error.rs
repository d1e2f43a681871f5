use thiserror::Error;

/// Errors that can occur during blob storage operations.
#[derive(Debug, Error)]
pub enum BlobError {
    /// The blob id contains characters that are not allowed.
    #[error("invalid blob id: {0}")]
    InvalidId(String),

    /// The blob exceeds the maximum allowed size.
    #[error("blob too large: {size} bytes exceeds limit of {limit} bytes")]
    TooLarge {
        /// Actual size.
        size: u64,
        /// Maximum allowed size.
        limit: u64,
    },

    /// A storage backend error occurred.
    #[error("blob storage error: {0}")]
    Storage(String),

    /// Stored metadata could not be read back.
    #[error("blob metadata error: {0}")]
    Metadata(String),
}

impl From<std::io::Error> for BlobError {
    fn from(e: std::io::Error) -> Self {
        Self::Storage(e.to_string())
    }
}
