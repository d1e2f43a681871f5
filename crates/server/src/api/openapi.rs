#![allow(clippy::needless_for_each)]

use utoipa::Modify;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};

use farmgate_core::{
    DeletionRequest, DeletionRequestStatus, Dimensions, PhotoStats, PhotoStatus,
    PhotoSubmission, Requester, RequesterRole,
};

use super::schemas::{
    CleanupResponse, DeletionListType, DeletionRequestBody, DeletionRequestCreated,
    DeletionRequestListResponse, ErrorResponse, HealthResponse, MetricsResponse, PhotoAction,
    PhotoActionResponse, PhotoCountResponse, PhotoListResponse, StatsResponse,
    SubmitPhotoRequest, SubmitPhotoResponse, TestEmailRequest, TestEmailResponse,
    ValidationErrorResponse, Verdict,
};

/// Registers the `X-API-Key` scheme referenced by admin paths.
struct ApiKeyAddon;

impl Modify for ApiKeyAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_key",
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("x-api-key"))),
        );
    }
}

#[derive(utoipa::OpenApi)]
#[openapi(
    info(
        title = "Farmgate Photo API",
        version = "0.1.0",
        description = "Photo submission and moderation for the farm shop directory.",
        license(name = "Apache-2.0")
    ),
    modifiers(&ApiKeyAddon),
    tags(
        (name = "Health", description = "Service health and metrics"),
        (name = "Photos", description = "Public photo submission and gallery"),
        (name = "Moderation", description = "Admin review of submitted photos"),
        (name = "Deletion Requests", description = "Removal requests, recovery and cleanup"),
        (name = "Admin", description = "Statistics and diagnostics")
    ),
    paths(
        super::health::health,
        super::photos::submit_photo,
        super::photos::shop_photos,
        super::photos::photo_image,
        super::photos::photo_thumbnail,
        super::photos::list_photos,
        super::photos::pending_photos,
        super::photos::get_photo,
        super::photos::admin_photo_image,
        super::photos::update_photo,
        super::photos::shop_photo_count,
        super::deletions::create_deletion_request,
        super::deletions::list_deletion_requests,
        super::deletions::get_deletion_request,
        super::deletions::cleanup,
        super::admin::stats,
        super::admin::test_email,
    ),
    components(schemas(
        HealthResponse, MetricsResponse, ErrorResponse, ValidationErrorResponse,
        PhotoSubmission, PhotoStatus, Dimensions, PhotoStats,
        DeletionRequest, DeletionRequestStatus, Requester, RequesterRole,
        SubmitPhotoRequest, SubmitPhotoResponse, PhotoListResponse,
        PhotoAction, Verdict, PhotoActionResponse, PhotoCountResponse,
        DeletionRequestBody, DeletionRequestCreated, DeletionRequestListResponse,
        DeletionListType, CleanupResponse,
        StatsResponse, TestEmailRequest, TestEmailResponse,
    ))
)]
pub struct ApiDoc;
