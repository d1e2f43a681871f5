use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::TransitionError;
use crate::types::{DeletionRequestId, PhotoId};

/// Who is asking for a photo to be removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum RequesterRole {
    Admin,
    ShopOwner,
    Submitter,
}

impl RequesterRole {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::ShopOwner => "shop_owner",
            Self::Submitter => "submitter",
        }
    }
}

impl std::fmt::Display for RequesterRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a deletion requester.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Requester {
    pub name: String,
    pub email: String,
    pub role: RequesterRole,
}

/// Review state of a deletion request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum DeletionRequestStatus {
    Pending,
    Approved,
    Rejected,
}

impl DeletionRequestStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for DeletionRequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An admin's verdict on a deletion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum DeletionDecision {
    Approve,
    Reject {
        #[serde(default)]
        reason: Option<String>,
    },
}

/// A request to remove a photo from the directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct DeletionRequest {
    pub id: DeletionRequestId,
    pub photo_id: PhotoId,
    pub requester: Requester,
    pub reason: String,
    pub status: DeletionRequestStatus,
    pub requested_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
}

impl DeletionRequest {
    /// Create a new pending request with a freshly generated id.
    #[must_use]
    pub fn new(
        photo_id: PhotoId,
        requester: Requester,
        reason: String,
        requested_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: DeletionRequestId::generate(),
            photo_id,
            requester,
            reason,
            status: DeletionRequestStatus::Pending,
            requested_at,
            reviewed_at: None,
            reviewed_by: None,
            rejection_reason: None,
        }
    }

    /// Record the review outcome. A request can be reviewed once.
    pub fn review(
        &mut self,
        decision: &DeletionDecision,
        reviewer: &str,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        if self.status != DeletionRequestStatus::Pending {
            return Err(TransitionError::AlreadyReviewed {
                status: self.status,
            });
        }
        self.reviewed_at = Some(now);
        self.reviewed_by = Some(reviewer.to_owned());
        match decision {
            DeletionDecision::Approve => {
                self.status = DeletionRequestStatus::Approved;
            }
            DeletionDecision::Reject { reason } => {
                self.status = DeletionRequestStatus::Rejected;
                self.rejection_reason = reason
                    .as_deref()
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .map(str::to_owned);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> DeletionRequest {
        DeletionRequest::new(
            PhotoId::from("photo_1"),
            Requester {
                name: "Bob".into(),
                email: "bob@farm.co.uk".into(),
                role: RequesterRole::ShopOwner,
            },
            "This is not our shop front".into(),
            Utc::now(),
        )
    }

    #[test]
    fn new_request_is_pending() {
        let req = request();
        assert_eq!(req.status, DeletionRequestStatus::Pending);
        assert!(req.reviewed_at.is_none());
    }

    #[test]
    fn review_once() {
        let mut req = request();
        req.review(&DeletionDecision::Approve, "admin", Utc::now())
            .unwrap();
        assert_eq!(req.status, DeletionRequestStatus::Approved);
        let err = req
            .review(&DeletionDecision::Reject { reason: None }, "admin", Utc::now())
            .unwrap_err();
        assert!(matches!(
            err,
            TransitionError::AlreadyReviewed {
                status: DeletionRequestStatus::Approved
            }
        ));
    }

    #[test]
    fn rejection_keeps_reason() {
        let mut req = request();
        req.review(
            &DeletionDecision::Reject {
                reason: Some("Photo is accurate".into()),
            },
            "admin",
            Utc::now(),
        )
        .unwrap();
        assert_eq!(req.status, DeletionRequestStatus::Rejected);
        assert_eq!(req.rejection_reason.as_deref(), Some("Photo is accurate"));
    }

    #[test]
    fn role_serde() {
        let role: RequesterRole = serde_json::from_str("\"shop_owner\"").unwrap();
        assert_eq!(role, RequesterRole::ShopOwner);
        assert!(serde_json::from_str::<RequesterRole>("\"visitor\"").is_err());
    }

    #[test]
    fn decision_is_tagged() {
        let decision: DeletionDecision =
            serde_json::from_str(r#"{"decision":"reject","reason":"no"}"#).unwrap();
        assert_eq!(
            decision,
            DeletionDecision::Reject {
                reason: Some("no".into())
            }
        );
    }
}
