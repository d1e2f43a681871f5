use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

use farmgate_moderation::ModerationError;

/// Errors that can occur when running the farmgate server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// A configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// An I/O error (e.g. binding the listener).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A workflow error surfaced through the API.
    #[error(transparent)]
    Moderation(#[from] ModerationError),

    /// The request itself is malformed (bad id, unknown query value).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Authentication failed (missing or invalid credentials).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The email backend refused a test message.
    #[error("email error: {0}")]
    Email(#[from] farmgate_email::EmailError),
}

impl ServerError {
    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Email(_) => StatusCode::BAD_GATEWAY,
            Self::Config(_) | Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Moderation(e) => match e {
                ModerationError::ValidationFailed(_) => StatusCode::BAD_REQUEST,
                ModerationError::NotFound(_) => StatusCode::NOT_FOUND,
                ModerationError::Conflict(_) => StatusCode::CONFLICT,
                ModerationError::Forbidden(_) => StatusCode::FORBIDDEN,
                ModerationError::InvalidState(_) => StatusCode::UNPROCESSABLE_ENTITY,
                ModerationError::Expired(_) => StatusCode::GONE,
                ModerationError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();

        let body = match &self {
            Self::Moderation(ModerationError::ValidationFailed(details)) => serde_json::json!({
                "error": "validation failed",
                "details": details,
            }),
            Self::Moderation(ModerationError::RateLimited {
                retry_after_seconds,
            }) => serde_json::json!({
                "error": "too many submissions, please try again later",
                "retry_after": retry_after_seconds,
            }),
            _ if status.is_server_error() => {
                error!(error = %self, "request failed");
                serde_json::json!({ "error": "internal error" })
            }
            _ => serde_json::json!({ "error": self.to_string() }),
        };

        let mut response = (status, axum::Json(body)).into_response();

        if let Self::Moderation(ModerationError::RateLimited {
            retry_after_seconds,
        }) = &self
        {
            response
                .headers_mut()
                .insert(axum::http::header::RETRY_AFTER, (*retry_after_seconds).into());
        }

        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workflow_errors_map_to_status_codes() {
        let cases = [
            (ModerationError::ValidationFailed(vec![]), StatusCode::BAD_REQUEST),
            (ModerationError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (ModerationError::Conflict("x".into()), StatusCode::CONFLICT),
            (ModerationError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (
                ModerationError::InvalidState("x".into()),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (ModerationError::Expired("x".into()), StatusCode::GONE),
            (
                ModerationError::RateLimited {
                    retry_after_seconds: 5,
                },
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (
                ModerationError::Image("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ServerError::from(err).status(), status);
        }
    }

    #[tokio::test]
    async fn internal_errors_are_opaque() {
        let err = ServerError::Moderation(ModerationError::State(
            farmgate_state::StateError::Backend("relation farmgate_state does not exist".into()),
        ));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "internal error");
    }

    #[test]
    fn rate_limit_sets_retry_after() {
        let response = ServerError::from(ModerationError::RateLimited {
            retry_after_seconds: 42,
        })
        .into_response();
        assert_eq!(
            response.headers().get(axum::http::header::RETRY_AFTER).unwrap(),
            "42"
        );
    }
}
