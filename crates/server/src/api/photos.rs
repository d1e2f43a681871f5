//! Photo endpoints: public submission and gallery, admin moderation.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};

use farmgate_core::{PhotoId, ShopId};
use farmgate_moderation::StoredImage;

use crate::auth::identity::CallerIdentity;
use crate::error::ServerError;

use super::schemas::{
    ErrorResponse, PhotoAction, PhotoActionResponse, PhotoCountResponse, PhotoListQuery,
    PhotoListResponse, SubmitPhotoRequest, SubmitPhotoResponse, ValidationErrorResponse,
};
use super::{AppState, bad_body};

/// Public images never change once stored.
const PUBLIC_CACHE: &str = "public, max-age=31536000";
const PRIVATE_CACHE: &str = "private, no-store";

/// Reject ids that cannot name a photo before touching storage.
pub(crate) fn parse_photo_id(raw: String) -> Result<PhotoId, ServerError> {
    let id = PhotoId::from(raw);
    if id.is_well_formed() {
        Ok(id)
    } else {
        Err(ServerError::BadRequest(format!("invalid photo id: {id}")))
    }
}

fn image_response(image: StoredImage, cache_control: &'static str) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, image.content_type),
            (header::CACHE_CONTROL, cache_control.to_owned()),
        ],
        image.data,
    )
        .into_response()
}

/// Name recorded as reviewer: an explicit name wins, then the API key name.
fn reviewer<'a>(explicit: Option<&'a str>, identity: &'a CallerIdentity) -> Option<&'a str> {
    explicit.or_else(|| (identity.auth_method == "api_key").then_some(identity.id.as_str()))
}

/// `POST /v1/photos` -- submit a photo for moderation.
#[utoipa::path(
    post,
    path = "/v1/photos",
    tag = "Photos",
    summary = "Submit photo",
    description = "Validates and stores a photo in the moderation queue.",
    request_body = SubmitPhotoRequest,
    responses(
        (status = 201, description = "Photo queued for moderation", body = SubmitPhotoResponse),
        (status = 400, description = "Validation failed", body = ValidationErrorResponse),
        (status = 429, description = "Too many submissions", body = ErrorResponse),
    )
)]
pub async fn submit_photo(
    State(state): State<AppState>,
    body: Result<Json<SubmitPhotoRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ServerError> {
    let Json(request) = body.map_err(|e| bad_body(&e))?;
    let photo = state.service.submit(request.into()).await?;
    Ok((
        StatusCode::CREATED,
        Json(SubmitPhotoResponse {
            success: true,
            submission_id: photo.id,
        }),
    ))
}

/// `GET /v1/shops/{shop_id}/photos` -- approved photos for a shop.
#[utoipa::path(
    get,
    path = "/v1/shops/{shop_id}/photos",
    tag = "Photos",
    summary = "Shop gallery",
    description = "Lists approved photos for a shop, newest first.",
    params(("shop_id" = String, Path, description = "Shop identifier")),
    responses(
        (status = 200, description = "Approved photos", body = PhotoListResponse),
    )
)]
pub async fn shop_photos(
    State(state): State<AppState>,
    Path(shop_id): Path<String>,
) -> Result<impl IntoResponse, ServerError> {
    let photos = state.service.approved_photos(&ShopId::from(shop_id)).await?;
    Ok((StatusCode::OK, Json(PhotoListResponse::from(photos))))
}

/// `GET /v1/photos/{id}/image` -- full image of an approved photo.
#[utoipa::path(
    get,
    path = "/v1/photos/{id}/image",
    tag = "Photos",
    summary = "Photo image",
    params(("id" = String, Path, description = "Photo id")),
    responses(
        (status = 200, description = "Image bytes", content_type = "image/*"),
        (status = 400, description = "Malformed photo id", body = ErrorResponse),
        (status = 404, description = "Photo not found or not approved", body = ErrorResponse),
    )
)]
pub async fn photo_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ServerError> {
    let id = parse_photo_id(id)?;
    let image = state.service.public_image(&id).await?;
    Ok(image_response(image, PUBLIC_CACHE))
}

/// `GET /v1/photos/{id}/thumbnail` -- thumbnail of an approved photo.
#[utoipa::path(
    get,
    path = "/v1/photos/{id}/thumbnail",
    tag = "Photos",
    summary = "Photo thumbnail",
    description = "Serves the generated thumbnail, or the full image until one exists.",
    params(("id" = String, Path, description = "Photo id")),
    responses(
        (status = 200, description = "Image bytes", content_type = "image/*"),
        (status = 400, description = "Malformed photo id", body = ErrorResponse),
        (status = 404, description = "Photo not found or not approved", body = ErrorResponse),
    )
)]
pub async fn photo_thumbnail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ServerError> {
    let id = parse_photo_id(id)?;
    let image = state.service.public_thumbnail(&id).await?;
    Ok(image_response(image, PUBLIC_CACHE))
}

/// `GET /v1/photos` -- all photos, optionally filtered.
#[utoipa::path(
    get,
    path = "/v1/photos",
    tag = "Moderation",
    summary = "List photos",
    description = "Lists stored photos, excluding soft-deleted ones, newest first.",
    params(PhotoListQuery),
    responses(
        (status = 200, description = "Photos", body = PhotoListResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
    ),
    security(("api_key" = []))
)]
pub async fn list_photos(
    State(state): State<AppState>,
    Query(query): Query<PhotoListQuery>,
) -> Result<impl IntoResponse, ServerError> {
    let photos = match query.shop_id {
        Some(shop_id) => {
            state
                .service
                .photos_for_shop(&ShopId::from(shop_id), query.status)
                .await?
        }
        None => state.service.all_photos(query.status).await?,
    };
    Ok((StatusCode::OK, Json(PhotoListResponse::from(photos))))
}

/// `GET /v1/photos/pending` -- the moderation queue.
#[utoipa::path(
    get,
    path = "/v1/photos/pending",
    tag = "Moderation",
    summary = "Moderation queue",
    responses(
        (status = 200, description = "Pending photos", body = PhotoListResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
    ),
    security(("api_key" = []))
)]
pub async fn pending_photos(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ServerError> {
    let photos = state.service.pending_photos().await?;
    Ok((StatusCode::OK, Json(PhotoListResponse::from(photos))))
}

/// `GET /v1/photos/{id}` -- full record of one photo.
#[utoipa::path(
    get,
    path = "/v1/photos/{id}",
    tag = "Moderation",
    summary = "Get photo",
    params(("id" = String, Path, description = "Photo id")),
    responses(
        (status = 200, description = "Photo record", body = farmgate_core::PhotoSubmission),
        (status = 400, description = "Malformed photo id", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 404, description = "Photo not found", body = ErrorResponse),
    ),
    security(("api_key" = []))
)]
pub async fn get_photo(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServerError> {
    let id = parse_photo_id(id)?;
    let photo = state.service.get_photo(&id).await?;
    Ok((StatusCode::OK, Json(photo)))
}

/// `GET /admin/photos/{id}/image` -- image of any stored photo.
#[utoipa::path(
    get,
    path = "/admin/photos/{id}/image",
    tag = "Moderation",
    summary = "Admin photo image",
    description = "Serves the image whatever the photo's status, for review.",
    params(("id" = String, Path, description = "Photo id")),
    responses(
        (status = 200, description = "Image bytes", content_type = "image/*"),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 404, description = "Photo not found", body = ErrorResponse),
    ),
    security(("api_key" = []))
)]
pub async fn admin_photo_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ServerError> {
    let id = parse_photo_id(id)?;
    let image = state.service.admin_image(&id).await?;
    Ok(image_response(image, PRIVATE_CACHE))
}

/// `PATCH /v1/photos/{id}` -- moderate, review a deletion, or recover.
#[utoipa::path(
    patch,
    path = "/v1/photos/{id}",
    tag = "Moderation",
    summary = "Transition photo",
    description = "Applies one workflow action, selected by the `action` field.",
    params(("id" = String, Path, description = "Photo id")),
    request_body = PhotoAction,
    responses(
        (status = 200, description = "Transition applied", body = PhotoActionResponse),
        (status = 400, description = "Malformed request", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 404, description = "Photo or request not found", body = ErrorResponse),
        (status = 409, description = "Concurrent update or request already reviewed", body = ErrorResponse),
        (status = 410, description = "Recovery window has closed", body = ErrorResponse),
        (status = 422, description = "Transition not allowed from current status", body = ErrorResponse),
    ),
    security(("api_key" = []))
)]
pub async fn update_photo(
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<CallerIdentity>,
    Path(id): Path<String>,
    body: Result<Json<PhotoAction>, JsonRejection>,
) -> Result<impl IntoResponse, ServerError> {
    let id = parse_photo_id(id)?;
    let Json(action) = body.map_err(|e| bad_body(&e))?;

    let photo = match action {
        PhotoAction::Moderate {
            status,
            rejection_reason,
            reviewed_by,
        } => {
            let decision = status.moderation(rejection_reason);
            state
                .service
                .moderate(&id, &decision, reviewer(reviewed_by.as_deref(), &identity))
                .await?
        }
        PhotoAction::ReviewDeletion {
            request_id,
            decision,
            rejection_reason,
            reviewed_by,
        } => {
            let request = state.service.get_deletion_request(&request_id).await?;
            if request.photo_id != id {
                return Err(ServerError::BadRequest(format!(
                    "deletion request {request_id} is not for photo {id}"
                )));
            }
            let decision = decision.deletion(rejection_reason);
            state
                .service
                .review_deletion(
                    &request_id,
                    &decision,
                    reviewer(reviewed_by.as_deref(), &identity),
                )
                .await?
        }
        PhotoAction::Recover { recovered_by } => {
            state
                .service
                .recover(&id, reviewer(recovered_by.as_deref(), &identity))
                .await?
        }
    };

    Ok((
        StatusCode::OK,
        Json(PhotoActionResponse {
            success: true,
            photo,
        }),
    ))
}

/// `GET /v1/shops/{shop_id}/photo-count` -- the shop's live photo counter.
#[utoipa::path(
    get,
    path = "/v1/shops/{shop_id}/photo-count",
    tag = "Moderation",
    summary = "Shop photo count",
    params(("shop_id" = String, Path, description = "Shop identifier")),
    responses(
        (status = 200, description = "Counter value", body = PhotoCountResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
    ),
    security(("api_key" = []))
)]
pub async fn shop_photo_count(
    State(state): State<AppState>,
    Path(shop_id): Path<String>,
) -> Result<impl IntoResponse, ServerError> {
    let shop_id = ShopId::from(shop_id);
    let count = state.service.shop_photo_count(&shop_id).await?;
    Ok((StatusCode::OK, Json(PhotoCountResponse { shop_id, count })))
}
