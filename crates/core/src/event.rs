//! Domain events emitted after each committed transition.

use serde::{Deserialize, Serialize};

use crate::deletion::DeletionRequest;
use crate::photo::PhotoSubmission;
use crate::types::PhotoId;

/// Something that happened to a photo.
///
/// Every variant carries the photo as it looked right after the transition
/// (for `Purged`, right before removal).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PhotoEvent {
    Submitted {
        photo: PhotoSubmission,
    },
    Approved {
        photo: PhotoSubmission,
    },
    Rejected {
        photo: PhotoSubmission,
        reason: String,
    },
    DeletionRequested {
        photo: PhotoSubmission,
        request: DeletionRequest,
    },
    DeletionApproved {
        photo: PhotoSubmission,
        request: DeletionRequest,
    },
    DeletionRejected {
        photo: PhotoSubmission,
        request: DeletionRequest,
        reason: Option<String>,
    },
    Recovered {
        photo: PhotoSubmission,
    },
    Purged {
        photo: PhotoSubmission,
    },
}

impl PhotoEvent {
    /// Short machine-readable name, used in logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Submitted { .. } => "submitted",
            Self::Approved { .. } => "approved",
            Self::Rejected { .. } => "rejected",
            Self::DeletionRequested { .. } => "deletion_requested",
            Self::DeletionApproved { .. } => "deletion_approved",
            Self::DeletionRejected { .. } => "deletion_rejected",
            Self::Recovered { .. } => "recovered",
            Self::Purged { .. } => "purged",
        }
    }

    #[must_use]
    pub fn photo(&self) -> &PhotoSubmission {
        match self {
            Self::Submitted { photo }
            | Self::Approved { photo }
            | Self::Rejected { photo, .. }
            | Self::DeletionRequested { photo, .. }
            | Self::DeletionApproved { photo, .. }
            | Self::DeletionRejected { photo, .. }
            | Self::Recovered { photo }
            | Self::Purged { photo } => photo,
        }
    }

    #[must_use]
    pub fn photo_id(&self) -> &PhotoId {
        &self.photo().id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::photo::PhotoStatus;
    use crate::photo::tests::sample_photo;

    #[test]
    fn event_kind_and_photo() {
        let event = PhotoEvent::Rejected {
            photo: sample_photo(PhotoStatus::Rejected),
            reason: "blurry".into(),
        };
        assert_eq!(event.kind(), "rejected");
        assert_eq!(event.photo_id().as_str(), "photo_1");
    }

    #[test]
    fn event_serializes_with_type_tag() {
        let event = PhotoEvent::Recovered {
            photo: sample_photo(PhotoStatus::Approved),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "recovered");
        assert_eq!(json["photo"]["status"], "approved");
    }
}
