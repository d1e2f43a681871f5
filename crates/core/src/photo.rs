//! Photo submissions and their moderation lifecycle.
//!
//! A submission moves through a closed set of states:
//!
//! ```text
//! pending ──approve──> approved <──recover── deleted
//!    │                  │   ▲                   ▲
//!    └──reject──> rejected  │ reject deletion   │ approve deletion
//!                           │                   │
//! pending/approved/rejected ──request──> deletion_requested
//! ```
//!
//! Every transition is a method on [`PhotoSubmission`] so the rules live in
//! one place; storage and notification concerns stay with the caller.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::deletion::DeletionRequest;
use crate::error::TransitionError;
use crate::types::{PhotoId, ShopId};

/// Reason recorded when a photo is rejected without an explicit reason.
pub const DEFAULT_REJECTION_REASON: &str = "Photo does not meet our guidelines";

/// Current lifecycle state of a photo submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum PhotoStatus {
    /// Awaiting moderation.
    Pending,
    /// Visible in the public gallery.
    Approved,
    /// Rejected by a moderator.
    Rejected,
    /// A deletion request is awaiting review.
    DeletionRequested,
    /// Soft-deleted; recoverable until `can_recover_until`.
    Deleted,
}

impl PhotoStatus {
    /// All statuses, in lifecycle order.
    pub const ALL: [Self; 5] = [
        Self::Pending,
        Self::Approved,
        Self::Rejected,
        Self::DeletionRequested,
        Self::Deleted,
    ];

    /// Return the canonical string representation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::DeletionRequested => "deletion_requested",
            Self::Deleted => "deleted",
        }
    }
}

impl std::fmt::Display for PhotoStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PhotoStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown photo status: {s}"))
    }
}

/// Pixel dimensions of a stored image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// A moderator's verdict on a submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ModerationDecision {
    Approve,
    Reject {
        #[serde(default)]
        reason: Option<String>,
    },
}

impl ModerationDecision {
    /// The status a photo ends up in after this decision.
    #[must_use]
    pub fn target_status(&self) -> PhotoStatus {
        match self {
            Self::Approve => PhotoStatus::Approved,
            Self::Reject { .. } => PhotoStatus::Rejected,
        }
    }
}

/// A user-submitted photo of a farm shop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct PhotoSubmission {
    pub id: PhotoId,
    pub shop_id: ShopId,
    pub shop_name: String,
    pub submitter_name: String,
    pub submitter_email: String,
    /// Reference to the stored full-size image.
    pub photo_url: String,
    /// Reference to the stored thumbnail; equals `photo_url` until one is generated.
    pub thumbnail_url: String,
    pub description: String,
    /// Decoded image size in bytes.
    pub file_size: u64,
    pub content_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Dimensions>,
    /// Quality score in `0..=100`.
    pub quality_score: u8,
    pub status: PhotoStatus,
    pub submitted_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_requested_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_requested_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub can_recover_until: Option<DateTime<Utc>>,
}

impl PhotoSubmission {
    /// Apply a moderation decision.
    ///
    /// A pending photo may be approved or rejected, and an earlier decision
    /// may be reversed (`approved <-> rejected`). Re-applying the current
    /// status, or moderating a photo that is in the deletion workflow, is an
    /// invalid transition.
    pub fn moderate(
        &mut self,
        decision: &ModerationDecision,
        reviewer: &str,
        now: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        let target = decision.target_status();
        let allowed = matches!(
            (self.status, target),
            (PhotoStatus::Pending, _)
                | (PhotoStatus::Approved, PhotoStatus::Rejected)
                | (PhotoStatus::Rejected, PhotoStatus::Approved)
        );
        if !allowed {
            return Err(TransitionError::Invalid {
                from: self.status,
                action: "moderate",
            });
        }

        self.status = target;
        self.reviewed_at = Some(now);
        self.reviewed_by = Some(reviewer.to_owned());
        self.rejection_reason = match decision {
            ModerationDecision::Approve => None,
            ModerationDecision::Reject { reason } => Some(
                reason
                    .as_deref()
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .unwrap_or(DEFAULT_REJECTION_REASON)
                    .to_owned(),
            ),
        };
        Ok(())
    }

    /// Open a deletion request against this photo.
    ///
    /// Fails with [`TransitionError::DeletionInProgress`] when a request is
    /// already open or the photo is already deleted.
    pub fn open_deletion(&mut self, request: &DeletionRequest) -> Result<(), TransitionError> {
        if matches!(
            self.status,
            PhotoStatus::DeletionRequested | PhotoStatus::Deleted
        ) {
            return Err(TransitionError::DeletionInProgress {
                status: self.status,
            });
        }
        self.status = PhotoStatus::DeletionRequested;
        self.deletion_requested_at = Some(request.requested_at);
        self.deletion_requested_by = Some(request.requester.email.clone());
        self.deletion_reason = Some(request.reason.clone());
        Ok(())
    }

    /// Soft-delete the photo after its deletion request was approved.
    ///
    /// The photo stays recoverable for `recovery_window` from `now`.
    pub fn approve_deletion(
        &mut self,
        deleted_by: &str,
        now: DateTime<Utc>,
        recovery_window: Duration,
    ) -> Result<(), TransitionError> {
        self.expect_status(PhotoStatus::DeletionRequested, "approve deletion")?;
        let deadline = now
            .checked_add_signed(recovery_window)
            .ok_or(TransitionError::RecoveryWindowOverflow)?;
        self.status = PhotoStatus::Deleted;
        self.deleted_at = Some(now);
        self.deleted_by = Some(deleted_by.to_owned());
        self.can_recover_until = Some(deadline);
        Ok(())
    }

    /// Restore the photo to `approved` after its deletion request was rejected.
    pub fn reject_deletion(&mut self) -> Result<(), TransitionError> {
        self.expect_status(PhotoStatus::DeletionRequested, "reject deletion")?;
        self.status = PhotoStatus::Approved;
        self.clear_deletion_fields();
        Ok(())
    }

    /// Bring a soft-deleted photo back while its recovery window is open.
    pub fn recover(&mut self, now: DateTime<Utc>) -> Result<(), TransitionError> {
        self.expect_status(PhotoStatus::Deleted, "recover")?;
        if let Some(deadline) = self.can_recover_until
            && now >= deadline
        {
            return Err(TransitionError::RecoveryExpired { deadline });
        }
        self.status = PhotoStatus::Approved;
        self.clear_deletion_fields();
        Ok(())
    }

    /// Whether the photo is soft-deleted and can still be recovered at `now`.
    #[must_use]
    pub fn is_recoverable(&self, now: DateTime<Utc>) -> bool {
        self.status == PhotoStatus::Deleted && self.can_recover_until.is_some_and(|d| now < d)
    }

    /// Whether the photo is soft-deleted and its recovery window has closed.
    #[must_use]
    pub fn is_purgeable(&self, now: DateTime<Utc>) -> bool {
        self.status == PhotoStatus::Deleted && self.can_recover_until.is_none_or(|d| now >= d)
    }

    fn expect_status(
        &self,
        expected: PhotoStatus,
        action: &'static str,
    ) -> Result<(), TransitionError> {
        if self.status == expected {
            Ok(())
        } else {
            Err(TransitionError::Invalid {
                from: self.status,
                action,
            })
        }
    }

    fn clear_deletion_fields(&mut self) {
        self.deletion_requested_at = None;
        self.deletion_requested_by = None;
        self.deletion_reason = None;
        self.deleted_at = None;
        self.deleted_by = None;
        self.can_recover_until = None;
    }
}
