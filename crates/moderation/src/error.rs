use farmgate_core::TransitionError;
use thiserror::Error;

/// Errors returned by [`PhotoService`](crate::PhotoService) operations.
#[derive(Debug, Error)]
pub enum ModerationError {
    /// One or more input rules were violated. Every violation is listed.
    #[error("validation failed: {}", .0.join("; "))]
    ValidationFailed(Vec<String>),

    /// The photo or deletion request does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// Another writer got there first, or a deletion is already in progress.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The requester may not act on this photo.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The photo is not in a state that allows the operation.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The recovery window has closed.
    #[error("expired: {0}")]
    Expired(String),

    /// The submitter has sent too many photos recently.
    #[error("rate limited, retry after {retry_after_seconds}s")]
    RateLimited { retry_after_seconds: u64 },

    /// An error occurred in the state store.
    #[error("state error: {0}")]
    State(#[from] farmgate_state::StateError),

    /// An error occurred in the blob store.
    #[error("blob error: {0}")]
    Blob(#[from] farmgate_blob::BlobError),

    /// A stored record could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An image could not be decoded or re-encoded.
    #[error("image error: {0}")]
    Image(String),

    /// The service was misconfigured (e.g. missing required components).
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl ModerationError {
    /// Whether this error reflects a backend failure rather than a caller mistake.
    #[must_use]
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::State(_)
                | Self::Blob(_)
                | Self::Serialization(_)
                | Self::Image(_)
                | Self::Configuration(_)
        )
    }
}

impl From<TransitionError> for ModerationError {
    fn from(e: TransitionError) -> Self {
        match e {
            TransitionError::Invalid { .. } => Self::InvalidState(e.to_string()),
            TransitionError::DeletionInProgress { .. } | TransitionError::AlreadyReviewed { .. } => {
                Self::Conflict(e.to_string())
            }
            TransitionError::RecoveryExpired { .. } => Self::Expired(e.to_string()),
            TransitionError::RecoveryWindowOverflow => Self::Configuration(e.to_string()),
        }
    }
}
