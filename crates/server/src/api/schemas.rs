use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use farmgate_core::{
    DeletionDecision, DeletionRequest, DeletionRequestId, ModerationDecision, PhotoId,
    PhotoStats, PhotoStatus, PhotoSubmission, RequesterRole, ShopId,
};
use farmgate_moderation::{DeletionRequestInput, MetricsSnapshot, SubmissionInput};

/// Error response body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Human-readable error message.
    #[schema(example = "photo photo_0192f1 not found")]
    pub error: String,
}

/// Returned when input validation fails. Every violation is listed.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ValidationErrorResponse {
    #[schema(example = "validation failed")]
    pub error: String,
    #[schema(example = json!(["Your name is required", "Please enter a valid email address"]))]
    pub details: Vec<String>,
}

/// Health check response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Service status indicator.
    #[schema(example = "ok")]
    pub status: String,
    /// Current workflow counters.
    pub metrics: MetricsResponse,
}

/// Workflow counters since startup.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MetricsResponse {
    /// Photos accepted into the moderation queue.
    #[schema(example = 42)]
    pub submissions: u64,
    /// Submissions refused by validation.
    pub validation_failures: u64,
    /// Submissions refused by the rate limit.
    pub rate_limited: u64,
    pub approvals: u64,
    pub rejections: u64,
    pub deletion_requests: u64,
    pub deletions: u64,
    pub recoveries: u64,
    /// Photos permanently removed by the cleanup sweep.
    pub purges: u64,
    /// Writes that lost an optimistic concurrency race.
    pub conflicts: u64,
    pub notifications_sent: u64,
    pub notifications_failed: u64,
    pub thumbnails_generated: u64,
    pub thumbnails_failed: u64,
}

impl From<MetricsSnapshot> for MetricsResponse {
    fn from(s: MetricsSnapshot) -> Self {
        Self {
            submissions: s.submissions,
            validation_failures: s.validation_failures,
            rate_limited: s.rate_limited,
            approvals: s.approvals,
            rejections: s.rejections,
            deletion_requests: s.deletion_requests,
            deletions: s.deletions,
            recoveries: s.recoveries,
            purges: s.purges,
            conflicts: s.conflicts,
            notifications_sent: s.notifications_sent,
            notifications_failed: s.notifications_failed,
            thumbnails_generated: s.thumbnails_generated,
            thumbnails_failed: s.thumbnails_failed,
        }
    }
}

// -- Photos -------------------------------------------------------------------

/// A new photo submission.
///
/// Missing fields are reported by validation rather than rejected outright,
/// so the client sees every problem at once.
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct SubmitPhotoRequest {
    #[schema(example = "hill-farm-shop")]
    pub shop_id: String,
    #[schema(example = "Hill Farm Shop")]
    pub shop_name: String,
    #[schema(example = "Ann Smith")]
    pub submitter_name: String,
    #[schema(example = "ann@example.com")]
    pub submitter_email: String,
    #[schema(example = "The shop front on a sunny morning")]
    pub description: String,
    /// `data:image/<jpeg|png|webp>;base64,<payload>`
    pub photo_data: String,
}

impl From<SubmitPhotoRequest> for SubmissionInput {
    fn from(req: SubmitPhotoRequest) -> Self {
        Self {
            shop_id: ShopId::from(req.shop_id),
            shop_name: req.shop_name,
            submitter_name: req.submitter_name,
            submitter_email: req.submitter_email,
            description: req.description,
            photo_data: req.photo_data,
        }
    }
}

/// Response after a successful submission.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SubmitPhotoResponse {
    pub success: bool,
    #[schema(value_type = String, example = "photo_0192f1c3a4b07c2e9d1f")]
    pub submission_id: PhotoId,
}

/// A list of photos.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PhotoListResponse {
    pub photos: Vec<PhotoSubmission>,
    #[schema(example = 3)]
    pub count: usize,
}

impl From<Vec<PhotoSubmission>> for PhotoListResponse {
    fn from(photos: Vec<PhotoSubmission>) -> Self {
        Self {
            count: photos.len(),
            photos,
        }
    }
}

/// Filters for the admin photo list.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PhotoListQuery {
    /// Restrict to one shop.
    pub shop_id: Option<String>,
    /// Restrict to one status.
    pub status: Option<PhotoStatus>,
}

/// A moderator's verdict, as sent over the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Approved,
    Rejected,
}

/// Body of `PATCH /v1/photos/{id}`, tagged by `action`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum PhotoAction {
    /// Approve or reject the photo.
    Moderate {
        status: Verdict,
        #[serde(default)]
        rejection_reason: Option<String>,
        #[serde(default)]
        reviewed_by: Option<String>,
    },
    /// Approve or reject a pending deletion request for the photo.
    ReviewDeletion {
        #[schema(value_type = String)]
        request_id: DeletionRequestId,
        decision: Verdict,
        #[serde(default)]
        rejection_reason: Option<String>,
        #[serde(default)]
        reviewed_by: Option<String>,
    },
    /// Bring a soft-deleted photo back while its recovery window is open.
    Recover {
        #[serde(default)]
        recovered_by: Option<String>,
    },
}

impl Verdict {
    pub fn moderation(self, reason: Option<String>) -> ModerationDecision {
        match self {
            Self::Approved => ModerationDecision::Approve,
            Self::Rejected => ModerationDecision::Reject { reason },
        }
    }

    pub fn deletion(self, reason: Option<String>) -> DeletionDecision {
        match self {
            Self::Approved => DeletionDecision::Approve,
            Self::Rejected => DeletionDecision::Reject { reason },
        }
    }
}

/// Response after a successful photo transition.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PhotoActionResponse {
    pub success: bool,
    pub photo: PhotoSubmission,
}

/// Approved photo count for a shop.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PhotoCountResponse {
    #[schema(value_type = String, example = "hill-farm-shop")]
    pub shop_id: ShopId,
    #[schema(example = 4)]
    pub count: u64,
}

// -- Deletion requests --------------------------------------------------------

/// A request to remove a photo.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeletionRequestBody {
    #[schema(value_type = String, example = "photo_0192f1c3a4b07c2e9d1f")]
    pub photo_id: PhotoId,
    #[serde(default)]
    pub requester_name: String,
    #[serde(default)]
    pub requester_email: String,
    pub requester_role: RequesterRole,
    #[serde(default)]
    #[schema(example = "This photo shows my house, not the shop")]
    pub reason: String,
}

impl From<DeletionRequestBody> for DeletionRequestInput {
    fn from(body: DeletionRequestBody) -> Self {
        Self {
            photo_id: body.photo_id,
            requester_name: body.requester_name,
            requester_email: body.requester_email,
            requester_role: body.requester_role,
            reason: body.reason,
        }
    }
}

/// Response after a deletion request is opened.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeletionRequestCreated {
    pub success: bool,
    #[schema(value_type = String, example = "delreq_0192f1c3a4b07c2e9d1f")]
    pub request_id: DeletionRequestId,
}

/// Which deletion list to return.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DeletionListType {
    /// Requests awaiting review.
    #[default]
    Pending,
    /// Deleted photos that can still be recovered.
    Recoverable,
}

/// Query for `GET /v1/deletion-requests`.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct DeletionListQuery {
    /// `pending` (default) or `recoverable`.
    #[serde(rename = "type", default)]
    pub list: DeletionListType,
}

/// Pending deletion requests.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DeletionRequestListResponse {
    pub requests: Vec<DeletionRequest>,
    pub count: usize,
}

/// Result of a cleanup sweep.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CleanupResponse {
    pub success: bool,
    #[schema(example = 2)]
    pub cleaned_count: usize,
}

// -- Admin --------------------------------------------------------------------

/// Aggregate counters.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StatsResponse {
    /// Stored photos by status.
    pub photos: PhotoStats,
    /// Workflow counters since startup.
    pub metrics: MetricsResponse,
}

/// Optional recipient for a test email.
#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct TestEmailRequest {
    /// Defaults to the configured admin address.
    pub to: Option<String>,
}

/// Outcome of a test email.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TestEmailResponse {
    pub success: bool,
    pub message_id: Option<String>,
    #[schema(example = "sent")]
    pub status: String,
}
