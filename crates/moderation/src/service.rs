use std::io::Cursor;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument, warn};

use farmgate_blob::BlobStore;
use farmgate_core::{
    Clock, DeletionDecision, DeletionRequest, DeletionRequestId, DeletionRequestStatus,
    Dimensions, ModerationDecision, PhotoEvent, PhotoId, PhotoStats, PhotoStatus,
    PhotoSubmission, Requester, RequesterRole, ShopId,
};
use farmgate_state::{CasResult, KeyKind, StateKey, StateStore};

use crate::config::ModerationConfig;
use crate::error::ModerationError;
use crate::metrics::ModerationMetrics;
use crate::ratelimit::SubmissionLimiter;
use crate::validation::{validate_deletion_request, validate_submission};

/// Attempts made by the shop counter CAS loop before giving up.
const COUNTER_CAS_ATTEMPTS: usize = 8;

/// Attempts made when attaching a thumbnail races with a moderation write.
const THUMBNAIL_CAS_ATTEMPTS: usize = 3;

/// Attempts made to write a photo after its deletion request was claimed.
const REVIEW_CAS_ATTEMPTS: usize = 3;

/// A photo submission as received from a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionInput {
    pub shop_id: ShopId,
    pub shop_name: String,
    pub submitter_name: String,
    pub submitter_email: String,
    pub description: String,
    /// `data:image/<type>;base64,<payload>`
    pub photo_data: String,
}

/// A deletion request as received from a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletionRequestInput {
    pub photo_id: PhotoId,
    pub requester_name: String,
    pub requester_email: String,
    pub requester_role: RequesterRole,
    pub reason: String,
}

/// Image bytes ready to be served.
#[derive(Debug, Clone)]
pub struct StoredImage {
    pub content_type: String,
    pub data: Bytes,
}

/// Owns every transition of a photo submission.
///
/// Records are written with compare-and-swap against the version read at the
/// start of the operation, so of two racing writers exactly one succeeds and
/// the other gets [`ModerationError::Conflict`]. Every committed transition
/// is broadcast as a [`PhotoEvent`].
pub struct PhotoService {
    pub(crate) state: Arc<dyn StateStore>,
    pub(crate) blobs: Arc<dyn BlobStore>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) events: broadcast::Sender<PhotoEvent>,
    pub(crate) metrics: Arc<ModerationMetrics>,
    pub(crate) config: ModerationConfig,
    pub(crate) limiter: SubmissionLimiter,
}

impl std::fmt::Debug for PhotoService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhotoService")
            .field("config", &self.config)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl PhotoService {
    /// Start building a service.
    pub fn builder() -> crate::builder::PhotoServiceBuilder {
        crate::builder::PhotoServiceBuilder::new()
    }

    /// Subscribe to committed transitions.
    pub fn subscribe(&self) -> broadcast::Receiver<PhotoEvent> {
        self.events.subscribe()
    }

    pub fn metrics(&self) -> &Arc<ModerationMetrics> {
        &self.metrics
    }

    pub fn config(&self) -> &ModerationConfig {
        &self.config
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // -- Intake ---------------------------------------------------------------

    /// Validate and store a new submission in `pending`.
    #[instrument(skip_all, fields(shop_id = %input.shop_id))]
    pub async fn submit(&self, input: SubmissionInput) -> Result<PhotoSubmission, ModerationError> {
        let image = match validate_submission(&input, &self.config) {
            Ok(image) => image,
            Err(e) => {
                self.metrics.increment_validation_failures();
                return Err(e);
            }
        };

        let now = self.clock.now();
        if let Err(e) = self.limiter.check(&input.submitter_email, now).await {
            if matches!(e, ModerationError::RateLimited { .. }) {
                self.metrics.increment_rate_limited();
            }
            return Err(e);
        }

        let id = PhotoId::generate();
        let dimensions = measure(&image.data);
        let file_size = image.size();
        if let Err(e) = self.blobs.put(&id, &image.content_type, image.data).await {
            self.limiter.release(&input.submitter_email, now).await;
            return Err(e.into());
        }

        let photo_url = format!("/v1/photos/{id}/image");
        let photo = PhotoSubmission {
            id: id.clone(),
            shop_id: ShopId::from(input.shop_id.trim()),
            shop_name: input.shop_name.trim().to_owned(),
            submitter_name: input.submitter_name.trim().to_owned(),
            submitter_email: input.submitter_email.trim().to_owned(),
            thumbnail_url: photo_url.clone(),
            photo_url,
            description: input.description.trim().to_owned(),
            file_size,
            content_type: image.content_type,
            dimensions,
            quality_score: rand::thread_rng().gen_range(60..=100),
            status: PhotoStatus::Pending,
            submitted_at: now,
            reviewed_at: None,
            reviewed_by: None,
            rejection_reason: None,
            deletion_requested_at: None,
            deletion_requested_by: None,
            deletion_reason: None,
            deleted_at: None,
            deleted_by: None,
            can_recover_until: None,
        };

        let created = match self.create(&self.photo_key(&id), &photo).await {
            Ok(created) => created,
            Err(e) => {
                self.discard_blob(&id).await;
                self.limiter.release(&input.submitter_email, now).await;
                return Err(e);
            }
        };
        if !created {
            self.discard_blob(&id).await;
            self.limiter.release(&input.submitter_email, now).await;
            return Err(ModerationError::Conflict(format!("photo {id} already exists")));
        }

        self.adjust_shop_count(&photo.shop_id, 1).await;
        self.metrics.increment_submissions();
        info!(photo_id = %id, file_size, "photo submitted");
        self.emit(PhotoEvent::Submitted {
            photo: photo.clone(),
        });
        Ok(photo)
    }

    // -- Moderation -----------------------------------------------------------

    /// Approve or reject a photo.
    #[instrument(skip(self, decision), fields(decision = ?decision.target_status()))]
    pub async fn moderate(
        &self,
        id: &PhotoId,
        decision: &ModerationDecision,
        reviewer: Option<&str>,
    ) -> Result<PhotoSubmission, ModerationError> {
        let (mut photo, version) = self.load_photo(id).await?;
        let reviewer = self.reviewer(reviewer);
        photo.moderate(decision, &reviewer, self.clock.now())?;
        self.save_photo(&photo, version).await?;

        match decision {
            ModerationDecision::Approve => {
                self.metrics.increment_approvals();
                info!(photo_id = %id, reviewer = %reviewer, "photo approved");
                self.emit(PhotoEvent::Approved {
                    photo: photo.clone(),
                });
            }
            ModerationDecision::Reject { .. } => {
                self.metrics.increment_rejections();
                let reason = photo.rejection_reason.clone().unwrap_or_default();
                info!(photo_id = %id, reviewer = %reviewer, reason = %reason, "photo rejected");
                self.emit(PhotoEvent::Rejected {
                    photo: photo.clone(),
                    reason,
                });
            }
        }
        Ok(photo)
    }

    // -- Deletion -------------------------------------------------------------

    /// Open a deletion request against a photo.
    #[instrument(skip_all, fields(photo_id = %input.photo_id, role = %input.requester_role))]
    pub async fn request_deletion(
        &self,
        input: DeletionRequestInput,
    ) -> Result<DeletionRequest, ModerationError> {
        validate_deletion_request(&input, &self.config)?;
        let (mut photo, version) = self.load_photo(&input.photo_id).await?;

        if matches!(
            photo.status,
            PhotoStatus::DeletionRequested | PhotoStatus::Deleted
        ) {
            return Err(ModerationError::Conflict(format!(
                "photo {} is already {}",
                photo.id, photo.status
            )));
        }
        if input.requester_role == RequesterRole::Submitter
            && !input
                .requester_email
                .trim()
                .eq_ignore_ascii_case(photo.submitter_email.trim())
        {
            return Err(ModerationError::Forbidden(
                "only the original submitter can request deletion as submitter".to_owned(),
            ));
        }

        let request = DeletionRequest::new(
            photo.id.clone(),
            Requester {
                name: input.requester_name.trim().to_owned(),
                email: input.requester_email.trim().to_owned(),
                role: input.requester_role,
            },
            input.reason.trim().to_owned(),
            self.clock.now(),
        );
        photo.open_deletion(&request)?;

        let request_key = self.request_key(&request.id);
        if !self.create(&request_key, &request).await? {
            return Err(ModerationError::Conflict(format!(
                "deletion request {} already exists",
                request.id
            )));
        }
        // The photo status is the gate: if another request won the race the
        // orphaned request record is removed again.
        if let Err(e) = self.save_photo(&photo, version).await {
            if let Err(cleanup) = self.state.delete(&request_key).await {
                error!(error = %cleanup, request_id = %request.id, "failed to remove orphaned deletion request");
            }
            return Err(e);
        }

        self.metrics.increment_deletion_requests();
        info!(photo_id = %photo.id, request_id = %request.id, "deletion requested");
        self.emit(PhotoEvent::DeletionRequested {
            photo,
            request: request.clone(),
        });
        Ok(request)
    }

    /// Approve or reject a pending deletion request.
    ///
    /// The request is claimed first; of two concurrent reviews only one gets
    /// past that write. If the photo can no longer take the review, the claim
    /// is undone and the request stays pending.
    #[instrument(skip(self, decision))]
    pub async fn review_deletion(
        &self,
        request_id: &DeletionRequestId,
        decision: &DeletionDecision,
        reviewer: Option<&str>,
    ) -> Result<PhotoSubmission, ModerationError> {
        let request_key = self.request_key(request_id);
        let (mut request, request_version) = self
            .load::<DeletionRequest>(&request_key)
            .await?
            .ok_or_else(|| ModerationError::NotFound(format!("deletion request {request_id}")))?;
        let (photo, photo_version) = self.load_photo(&request.photo_id).await?;

        let reviewer = self.reviewer(reviewer);
        let now = self.clock.now();
        let pending = request.clone();
        request.review(decision, &reviewer, now)?;
        let photo = self.apply_deletion_review(photo, decision, &reviewer, now)?;

        self.cas(&request_key, request_version, &request).await?;
        let photo = match self
            .commit_deletion_review(photo, photo_version, decision, &reviewer, now)
            .await
        {
            Ok(photo) => photo,
            Err(e) => {
                warn!(
                    error = %e,
                    request_id = %request.id,
                    "photo update failed after claiming deletion request, returning it to pending"
                );
                // The claim bumped the request by exactly one version.
                if let Err(undo) = self.cas(&request_key, request_version + 1, &pending).await {
                    error!(
                        error = %undo,
                        request_id = %request.id,
                        "deletion request left reviewed without its photo update"
                    );
                }
                return Err(e);
            }
        };

        match decision {
            DeletionDecision::Approve => {
                self.adjust_shop_count(&photo.shop_id, -1).await;
                self.metrics.increment_deletions();
                info!(photo_id = %photo.id, request_id = %request.id, "deletion approved");
                self.emit(PhotoEvent::DeletionApproved {
                    photo: photo.clone(),
                    request,
                });
            }
            DeletionDecision::Reject { .. } => {
                info!(photo_id = %photo.id, request_id = %request.id, "deletion rejected");
                let reason = request.rejection_reason.clone();
                self.emit(PhotoEvent::DeletionRejected {
                    photo: photo.clone(),
                    request,
                    reason,
                });
            }
        }
        Ok(photo)
    }

    fn apply_deletion_review(
        &self,
        mut photo: PhotoSubmission,
        decision: &DeletionDecision,
        reviewer: &str,
        now: DateTime<Utc>,
    ) -> Result<PhotoSubmission, ModerationError> {
        match decision {
            DeletionDecision::Approve => {
                photo.approve_deletion(reviewer, now, self.config.recovery_window())?;
            }
            DeletionDecision::Reject { .. } => photo.reject_deletion()?,
        }
        Ok(photo)
    }

    /// Write a reviewed photo, re-applying the review on top of unrelated
    /// concurrent writes. Fails once the photo has left `deletion_requested`.
    async fn commit_deletion_review(
        &self,
        mut reviewed: PhotoSubmission,
        mut version: u64,
        decision: &DeletionDecision,
        reviewer: &str,
        now: DateTime<Utc>,
    ) -> Result<PhotoSubmission, ModerationError> {
        let key = self.photo_key(&reviewed.id);
        for _ in 0..REVIEW_CAS_ATTEMPTS {
            match self
                .state
                .compare_and_swap(&key, version, &serde_json::to_string(&reviewed)?, None)
                .await?
            {
                CasResult::Ok => return Ok(reviewed),
                CasResult::Conflict { .. } => {
                    debug!(photo_id = %reviewed.id, "photo changed while applying deletion review, retrying");
                    let (current, current_version) = self.load_photo(&reviewed.id).await?;
                    reviewed = self.apply_deletion_review(current, decision, reviewer, now)?;
                    version = current_version;
                }
            }
        }
        self.metrics.increment_conflicts();
        Err(ModerationError::Conflict(format!(
            "photo {} kept changing while applying deletion review",
            reviewed.id
        )))
    }

    /// Bring a soft-deleted photo back while its recovery window is open.
    #[instrument(skip(self))]
    pub async fn recover(
        &self,
        id: &PhotoId,
        recovered_by: Option<&str>,
    ) -> Result<PhotoSubmission, ModerationError> {
        let (mut photo, version) = self.load_photo(id).await?;
        photo.recover(self.clock.now())?;
        self.save_photo(&photo, version).await?;

        self.adjust_shop_count(&photo.shop_id, 1).await;
        self.metrics.increment_recoveries();
        info!(photo_id = %id, recovered_by = %self.reviewer(recovered_by), "photo recovered");
        self.emit(PhotoEvent::Recovered {
            photo: photo.clone(),
        });
        Ok(photo)
    }

    /// Permanently remove deleted photos whose recovery window has closed.
    ///
    /// Each removal is conditional on the version read during the sweep, so a
    /// photo recovered mid-sweep is skipped. Returns the number removed.
    pub async fn cleanup_expired(&self) -> Result<usize, ModerationError> {
        let now = self.clock.now();
        let candidates: Vec<PhotoSubmission> = self
            .scan::<PhotoSubmission>(KeyKind::Photo)
            .await?
            .into_iter()
            .filter(|p| p.is_purgeable(now))
            .collect();

        let mut purged = 0;
        for candidate in candidates {
            let key = self.photo_key(&candidate.id);
            let Some((photo, version)) = self.load::<PhotoSubmission>(&key).await? else {
                continue;
            };
            if !photo.is_purgeable(now) {
                continue;
            }
            match self.state.compare_and_delete(&key, version).await? {
                CasResult::Ok => {}
                CasResult::Conflict { .. } => {
                    self.metrics.increment_conflicts();
                    debug!(photo_id = %photo.id, "photo changed during cleanup, skipping");
                    continue;
                }
            }
            self.discard_blob(&photo.id).await;
            self.discard_blob(&photo.id.thumbnail_blob_id()).await;
            info!(photo_id = %photo.id, "photo permanently removed");
            self.emit(PhotoEvent::Purged { photo });
            purged += 1;
        }

        self.metrics.add_purges(purged as u64);
        Ok(purged)
    }

    // -- Thumbnails -----------------------------------------------------------

    /// Store a generated thumbnail and point the record at it.
    pub async fn attach_thumbnail(
        &self,
        id: &PhotoId,
        data: Bytes,
        source: Dimensions,
    ) -> Result<PhotoSubmission, ModerationError> {
        self.blobs
            .put(&id.thumbnail_blob_id(), "image/jpeg", data)
            .await?;

        for _ in 0..THUMBNAIL_CAS_ATTEMPTS {
            let key = self.photo_key(id);
            let Some((mut photo, version)) = self.load::<PhotoSubmission>(&key).await? else {
                self.discard_blob(&id.thumbnail_blob_id()).await;
                return Err(ModerationError::NotFound(format!("photo {id}")));
            };
            photo.thumbnail_url = format!("/v1/photos/{id}/thumbnail");
            photo.dimensions.get_or_insert(source);
            match self
                .state
                .compare_and_swap(&key, version, &serde_json::to_string(&photo)?, None)
                .await?
            {
                CasResult::Ok => return Ok(photo),
                CasResult::Conflict { .. } => {
                    debug!(photo_id = %id, "photo changed while attaching thumbnail, retrying");
                }
            }
        }
        self.metrics.increment_conflicts();
        Err(ModerationError::Conflict(format!(
            "photo {id} kept changing while attaching thumbnail"
        )))
    }

    // -- Queries --------------------------------------------------------------

    /// Photos for a shop, optionally filtered by status. Deleted photos are
    /// never returned.
    pub async fn photos_for_shop(
        &self,
        shop_id: &ShopId,
        status: Option<PhotoStatus>,
    ) -> Result<Vec<PhotoSubmission>, ModerationError> {
        self.photos_where(|p| {
            p.shop_id == *shop_id
                && p.status != PhotoStatus::Deleted
                && status.is_none_or(|s| p.status == s)
        })
        .await
    }

    /// Every photo, optionally filtered by status, excluding deleted ones.
    pub async fn all_photos(
        &self,
        status: Option<PhotoStatus>,
    ) -> Result<Vec<PhotoSubmission>, ModerationError> {
        self.photos_where(|p| {
            p.status != PhotoStatus::Deleted && status.is_none_or(|s| p.status == s)
        })
        .await
    }

    /// The public gallery for a shop.
    pub async fn approved_photos(
        &self,
        shop_id: &ShopId,
    ) -> Result<Vec<PhotoSubmission>, ModerationError> {
        self.photos_for_shop(shop_id, Some(PhotoStatus::Approved))
            .await
    }

    /// The moderation queue.
    pub async fn pending_photos(&self) -> Result<Vec<PhotoSubmission>, ModerationError> {
        self.photos_where(|p| p.status == PhotoStatus::Pending)
            .await
    }

    /// Deleted photos that can still be recovered.
    pub async fn recoverable_photos(&self) -> Result<Vec<PhotoSubmission>, ModerationError> {
        let now = self.clock.now();
        self.photos_where(|p| p.is_recoverable(now)).await
    }

    /// Deletion requests awaiting review, newest first.
    pub async fn pending_deletion_requests(
        &self,
    ) -> Result<Vec<DeletionRequest>, ModerationError> {
        let mut requests: Vec<DeletionRequest> = self
            .scan::<DeletionRequest>(KeyKind::DeletionRequest)
            .await?
            .into_iter()
            .filter(|r| r.status == DeletionRequestStatus::Pending)
            .collect();
        requests.sort_by(|a, b| {
            b.requested_at
                .cmp(&a.requested_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(requests)
    }

    pub async fn get_photo(&self, id: &PhotoId) -> Result<PhotoSubmission, ModerationError> {
        self.load_photo(id).await.map(|(photo, _)| photo)
    }

    pub async fn get_deletion_request(
        &self,
        id: &DeletionRequestId,
    ) -> Result<DeletionRequest, ModerationError> {
        self.load::<DeletionRequest>(&self.request_key(id))
            .await?
            .map(|(request, _)| request)
            .ok_or_else(|| ModerationError::NotFound(format!("deletion request {id}")))
    }

    /// The shop's photo counter. Zero for unknown shops.
    pub async fn shop_photo_count(&self, shop_id: &ShopId) -> Result<u64, ModerationError> {
        let value = self.state.get(&self.counter_key(shop_id)).await?;
        Ok(value
            .and_then(|v| v.parse::<i64>().ok())
            .and_then(|v| u64::try_from(v).ok())
            .unwrap_or(0))
    }

    pub async fn stats(&self) -> Result<PhotoStats, ModerationError> {
        let photos = self.scan::<PhotoSubmission>(KeyKind::Photo).await?;
        Ok(PhotoStats::from_photos(&photos))
    }

    /// Full-size image of an approved photo.
    pub async fn public_image(&self, id: &PhotoId) -> Result<StoredImage, ModerationError> {
        self.approved(id).await?;
        self.blob(id).await
    }

    /// Thumbnail of an approved photo, falling back to the full image while
    /// no thumbnail has been generated.
    pub async fn public_thumbnail(&self, id: &PhotoId) -> Result<StoredImage, ModerationError> {
        self.approved(id).await?;
        match self.blob(&id.thumbnail_blob_id()).await {
            Err(ModerationError::NotFound(_)) => self.blob(id).await,
            other => other,
        }
    }

    /// Full-size image of any stored photo, whatever its status.
    pub async fn admin_image(&self, id: &PhotoId) -> Result<StoredImage, ModerationError> {
        self.load_photo(id).await?;
        self.blob(id).await
    }

    // -- Internals ------------------------------------------------------------

    fn photo_key(&self, id: &str) -> StateKey {
        StateKey::new(self.config.namespace.as_str(), KeyKind::Photo, id)
    }

    fn request_key(&self, id: &str) -> StateKey {
        StateKey::new(self.config.namespace.as_str(), KeyKind::DeletionRequest, id)
    }

    fn counter_key(&self, shop_id: &str) -> StateKey {
        StateKey::new(self.config.namespace.as_str(), KeyKind::ShopCounter, shop_id)
    }

    fn reviewer(&self, reviewer: Option<&str>) -> String {
        reviewer
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(&self.config.default_reviewer)
            .to_owned()
    }

    fn emit(&self, event: PhotoEvent) {
        let kind = event.kind();
        if self.events.send(event).is_err() {
            debug!(event = kind, "no event subscribers");
        }
    }

    async fn approved(&self, id: &PhotoId) -> Result<PhotoSubmission, ModerationError> {
        let photo = self.get_photo(id).await?;
        if photo.status == PhotoStatus::Approved {
            Ok(photo)
        } else {
            Err(ModerationError::NotFound(format!("photo {id}")))
        }
    }

    async fn blob(&self, id: &str) -> Result<StoredImage, ModerationError> {
        let (metadata, data) = self
            .blobs
            .get(id)
            .await?
            .ok_or_else(|| ModerationError::NotFound(format!("image {id}")))?;
        Ok(StoredImage {
            content_type: metadata.content_type,
            data,
        })
    }

    async fn discard_blob(&self, id: &str) {
        if let Err(e) = self.blobs.delete(id).await {
            warn!(error = %e, blob_id = %id, "failed to delete blob");
        }
    }

    async fn load<T: DeserializeOwned>(
        &self,
        key: &StateKey,
    ) -> Result<Option<(T, u64)>, ModerationError> {
        match self.state.get_versioned(key).await? {
            Some(v) => Ok(Some((serde_json::from_str(&v.value)?, v.version))),
            None => Ok(None),
        }
    }

    async fn load_photo(&self, id: &PhotoId) -> Result<(PhotoSubmission, u64), ModerationError> {
        self.load(&self.photo_key(id))
            .await?
            .ok_or_else(|| ModerationError::NotFound(format!("photo {id}")))
    }

    async fn save_photo(
        &self,
        photo: &PhotoSubmission,
        expected_version: u64,
    ) -> Result<(), ModerationError> {
        self.cas(&self.photo_key(&photo.id), expected_version, photo)
            .await
    }

    async fn create<T: Serialize>(&self, key: &StateKey, value: &T) -> Result<bool, ModerationError> {
        let json = serde_json::to_string(value)?;
        Ok(self.state.check_and_set(key, &json, None).await?)
    }

    async fn cas<T: Serialize>(
        &self,
        key: &StateKey,
        expected_version: u64,
        value: &T,
    ) -> Result<(), ModerationError> {
        let json = serde_json::to_string(value)?;
        match self
            .state
            .compare_and_swap(key, expected_version, &json, None)
            .await?
        {
            CasResult::Ok => Ok(()),
            CasResult::Conflict {
                current_version, ..
            } => {
                self.metrics.increment_conflicts();
                warn!(key = %key, expected_version, current_version, "concurrent update detected");
                Err(ModerationError::Conflict(format!(
                    "{} was modified concurrently",
                    key.id
                )))
            }
        }
    }

    /// Scan and decode every record of `kind`, skipping unreadable ones.
    async fn scan<T: DeserializeOwned>(&self, kind: KeyKind) -> Result<Vec<T>, ModerationError> {
        let entries = self
            .state
            .scan_keys(&self.config.namespace, kind, None)
            .await?;
        Ok(entries
            .into_iter()
            .filter_map(|(key, value)| match serde_json::from_str(&value) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!(key = %key, error = %e, "skipping unreadable record");
                    None
                }
            })
            .collect())
    }

    async fn photos_where(
        &self,
        predicate: impl Fn(&PhotoSubmission) -> bool,
    ) -> Result<Vec<PhotoSubmission>, ModerationError> {
        let mut photos: Vec<PhotoSubmission> = self
            .scan::<PhotoSubmission>(KeyKind::Photo)
            .await?
            .into_iter()
            .filter(|p| predicate(p))
            .collect();
        photos.sort_by(|a, b| {
            b.submitted_at
                .cmp(&a.submitted_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(photos)
    }

    /// Add `delta` to a shop's counter, never going below zero.
    ///
    /// Runs after the owning transition has committed, so failures are
    /// logged rather than returned.
    async fn adjust_shop_count(&self, shop_id: &ShopId, delta: i64) {
        let key = self.counter_key(shop_id);
        for _ in 0..COUNTER_CAS_ATTEMPTS {
            match self.try_adjust(&key, delta).await {
                Ok(true) => return,
                Ok(false) => debug!(shop_id = %shop_id, "shop counter contended, retrying"),
                Err(e) => {
                    error!(error = %e, shop_id = %shop_id, "failed to adjust shop counter");
                    return;
                }
            }
        }
        self.metrics.increment_conflicts();
        error!(shop_id = %shop_id, delta, "gave up adjusting shop counter");
    }

    async fn try_adjust(&self, key: &StateKey, delta: i64) -> Result<bool, ModerationError> {
        match self.state.get_versioned(key).await? {
            None => {
                let initial = delta.max(0).to_string();
                Ok(self.state.check_and_set(key, &initial, None).await?)
            }
            Some(current) => {
                let value: i64 = current.value.parse().unwrap_or(0);
                let next = (value + delta).max(0).to_string();
                let result = self
                    .state
                    .compare_and_swap(key, current.version, &next, None)
                    .await?;
                Ok(result == CasResult::Ok)
            }
        }
    }
}

/// Read pixel dimensions from the image header.
fn measure(data: &[u8]) -> Option<Dimensions> {
    image::ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
        .map(|(width, height)| Dimensions { width, height })
}
