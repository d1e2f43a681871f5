use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use tracing::info;

use crate::auth::identity::CallerIdentity;
use crate::error::ServerError;

use super::AppState;
use super::schemas::{ErrorResponse, StatsResponse, TestEmailRequest, TestEmailResponse};

/// `GET /v1/stats` -- aggregate counters.
#[utoipa::path(
    get,
    path = "/v1/stats",
    tag = "Admin",
    summary = "Statistics",
    description = "Stored photos by status plus workflow counters since startup.",
    responses(
        (status = 200, description = "Counters", body = StatsResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
    ),
    security(("api_key" = []))
)]
pub async fn stats(State(state): State<AppState>) -> Result<impl IntoResponse, ServerError> {
    let photos = state.service.stats().await?;
    Ok((
        StatusCode::OK,
        Json(StatsResponse {
            photos,
            metrics: state.service.metrics().snapshot().into(),
        }),
    ))
}

/// `POST /admin/test-email` -- check email delivery.
#[utoipa::path(
    post,
    path = "/admin/test-email",
    tag = "Admin",
    summary = "Send test email",
    description = "Sends a test message to `to`, or the configured admin address. The body is optional.",
    request_body(content = TestEmailRequest, description = "Optional recipient"),
    responses(
        (status = 200, description = "Message accepted by the backend", body = TestEmailResponse),
        (status = 400, description = "Malformed body", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 502, description = "Email backend refused the message", body = ErrorResponse),
    ),
    security(("api_key" = []))
)]
pub async fn test_email(
    State(state): State<AppState>,
    axum::Extension(identity): axum::Extension<CallerIdentity>,
    body: Bytes,
) -> Result<impl IntoResponse, ServerError> {
    let request: TestEmailRequest = if body.iter().all(u8::is_ascii_whitespace) {
        TestEmailRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| ServerError::BadRequest(e.to_string()))?
    };

    let result = state.notifier.send_test(request.to.as_deref()).await?;
    info!(caller = %identity.id, status = %result.status, "test email sent");
    Ok((
        StatusCode::OK,
        Json(TestEmailResponse {
            success: true,
            message_id: result.message_id,
            status: result.status,
        }),
    ))
}
