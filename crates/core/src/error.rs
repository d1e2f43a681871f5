use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::deletion::DeletionRequestStatus;
use crate::photo::PhotoStatus;

/// A lifecycle rule was violated by a requested transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("cannot {action} a photo that is {from}")]
    Invalid {
        from: PhotoStatus,
        action: &'static str,
    },

    #[error("photo is already {status}")]
    DeletionInProgress { status: PhotoStatus },

    #[error("deletion request has already been {status}")]
    AlreadyReviewed { status: DeletionRequestStatus },

    #[error("recovery window closed at {deadline}")]
    RecoveryExpired { deadline: DateTime<Utc> },

    #[error("recovery window extends past the representable date range")]
    RecoveryWindowOverflow,
}
