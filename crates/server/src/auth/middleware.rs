use axum::extract::{Request, State};
use axum::http::{HeaderMap, header};
use axum::middleware::Next;
use axum::response::Response;
use tracing::debug;

use super::identity::CallerIdentity;
use crate::api::AppState;
use crate::error::ServerError;

/// Header carrying a raw API key.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Extract a raw key from `X-API-Key` or `Authorization: Bearer`.
pub fn extract_api_key(headers: &HeaderMap) -> Option<&str> {
    if let Some(key) = headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok()) {
        return Some(key.trim());
    }
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
}

/// Admin gate. Inserts a [`CallerIdentity`] extension for handlers.
pub async fn require_admin(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ServerError> {
    let identity = match &state.auth {
        None => CallerIdentity::anonymous(),
        Some(auth) => {
            let raw = extract_api_key(request.headers())
                .filter(|k| !k.is_empty())
                .ok_or_else(|| ServerError::Unauthorized("missing API key".into()))?;
            auth.authenticate_api_key(raw)
                .ok_or_else(|| ServerError::Unauthorized("invalid API key".into()))?
        }
    };
    debug!(caller = %identity.id, method = %identity.auth_method, "admin request authenticated");
    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}
