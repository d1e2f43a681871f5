//! Deletion request endpoints.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;

use farmgate_core::{DeletionRequestId, RequesterRole};

use crate::auth::middleware::extract_api_key;
use crate::error::ServerError;

use super::schemas::{
    CleanupResponse, DeletionListQuery, DeletionListType, DeletionRequestBody,
    DeletionRequestCreated, DeletionRequestListResponse, ErrorResponse, PhotoListResponse,
    ValidationErrorResponse,
};
use super::{AppState, bad_body};

/// `POST /v1/deletion-requests` -- ask for a photo to be removed.
#[utoipa::path(
    post,
    path = "/v1/deletion-requests",
    tag = "Deletion Requests",
    summary = "Request deletion",
    description = "Opens a deletion request. Submitters must use the address they submitted with; the `admin` role requires an API key.",
    request_body = DeletionRequestBody,
    responses(
        (status = 201, description = "Request opened", body = DeletionRequestCreated),
        (status = 400, description = "Validation failed", body = ValidationErrorResponse),
        (status = 401, description = "Admin role without a valid API key", body = ErrorResponse),
        (status = 403, description = "Email does not match the submitter", body = ErrorResponse),
        (status = 404, description = "Photo not found", body = ErrorResponse),
        (status = 409, description = "Deletion already requested or photo deleted", body = ErrorResponse),
    )
)]
pub async fn create_deletion_request(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<DeletionRequestBody>, JsonRejection>,
) -> Result<impl IntoResponse, ServerError> {
    let Json(body) = body.map_err(|e| bad_body(&e))?;
    if body.requester_role == RequesterRole::Admin
        && let Some(auth) = &state.auth
    {
        extract_api_key(&headers)
            .and_then(|key| auth.authenticate_api_key(key))
            .ok_or_else(|| ServerError::Unauthorized("admin role requires an API key".into()))?;
    }
    let request = state.service.request_deletion(body.into()).await?;
    Ok((
        StatusCode::CREATED,
        Json(DeletionRequestCreated {
            success: true,
            request_id: request.id,
        }),
    ))
}

/// `GET /v1/deletion-requests` -- pending requests or recoverable photos.
#[utoipa::path(
    get,
    path = "/v1/deletion-requests",
    tag = "Deletion Requests",
    summary = "List deletion requests",
    description = "`type=pending` returns `{requests, count}`; `type=recoverable` returns `{photos, count}`.",
    params(DeletionListQuery),
    responses(
        (status = 200, description = "Pending requests, or recoverable photos for `type=recoverable`", body = DeletionRequestListResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
    ),
    security(("api_key" = []))
)]
pub async fn list_deletion_requests(
    State(state): State<AppState>,
    Query(query): Query<DeletionListQuery>,
) -> Result<impl IntoResponse, ServerError> {
    let body = match query.list {
        DeletionListType::Pending => {
            let requests = state.service.pending_deletion_requests().await?;
            serde_json::json!(DeletionRequestListResponse {
                count: requests.len(),
                requests,
            })
        }
        DeletionListType::Recoverable => {
            let photos = state.service.recoverable_photos().await?;
            serde_json::json!(PhotoListResponse::from(photos))
        }
    };
    Ok((StatusCode::OK, Json(body)))
}

/// `GET /v1/deletion-requests/{id}` -- one deletion request.
#[utoipa::path(
    get,
    path = "/v1/deletion-requests/{id}",
    tag = "Deletion Requests",
    summary = "Get deletion request",
    params(("id" = String, Path, description = "Deletion request id")),
    responses(
        (status = 200, description = "Deletion request", body = farmgate_core::DeletionRequest),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 404, description = "Request not found", body = ErrorResponse),
    ),
    security(("api_key" = []))
)]
pub async fn get_deletion_request(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ServerError> {
    let request = state
        .service
        .get_deletion_request(&DeletionRequestId::from(id))
        .await?;
    Ok((StatusCode::OK, Json(request)))
}

/// `POST /v1/deletion-requests/cleanup` -- purge expired deletions now.
#[utoipa::path(
    post,
    path = "/v1/deletion-requests/cleanup",
    tag = "Deletion Requests",
    summary = "Run cleanup",
    description = "Permanently removes deleted photos whose recovery window has closed.",
    responses(
        (status = 200, description = "Sweep finished", body = CleanupResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
    ),
    security(("api_key" = []))
)]
pub async fn cleanup(State(state): State<AppState>) -> Result<impl IntoResponse, ServerError> {
    let cleaned_count = state.service.cleanup_expired().await?;
    Ok((
        StatusCode::OK,
        Json(CleanupResponse {
            success: true,
            cleaned_count,
        }),
    ))
}
