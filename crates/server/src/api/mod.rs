pub mod admin;
pub mod deletions;
pub mod health;
pub mod openapi;
pub mod photos;
pub mod schemas;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::extract::rejection::JsonRejection;
use axum::http::HeaderValue;
use axum::middleware;
use axum::routing::{get, post};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use farmgate_moderation::{NotificationDispatcher, PhotoService};

use crate::auth::AuthProvider;
use crate::auth::middleware::require_admin;
use crate::error::ServerError;

use self::openapi::ApiDoc;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// The moderation workflow.
    pub service: Arc<PhotoService>,
    /// Used for admin test emails; the same instance consumes the event bus.
    pub notifier: Arc<NotificationDispatcher>,
    /// Optional auth provider (None when auth is disabled).
    pub auth: Option<Arc<AuthProvider>>,
    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,
    /// Browser origins allowed by CORS. Empty disables the CORS layer.
    pub cors_origins: Vec<String>,
}

/// Build the Axum router with all API routes, middleware, and Swagger UI.
pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(health::health))
        .route("/v1/photos", post(photos::submit_photo))
        .route("/v1/shops/{shop_id}/photos", get(photos::shop_photos))
        .route("/v1/photos/{id}/image", get(photos::photo_image))
        .route("/v1/photos/{id}/thumbnail", get(photos::photo_thumbnail))
        .route(
            "/v1/deletion-requests",
            post(deletions::create_deletion_request),
        );

    let protected = Router::new()
        .route("/v1/photos", get(photos::list_photos))
        .route("/v1/photos/pending", get(photos::pending_photos))
        .route(
            "/v1/photos/{id}",
            get(photos::get_photo).patch(photos::update_photo),
        )
        .route("/admin/photos/{id}/image", get(photos::admin_photo_image))
        .route(
            "/v1/shops/{shop_id}/photo-count",
            get(photos::shop_photo_count),
        )
        .route(
            "/v1/deletion-requests",
            get(deletions::list_deletion_requests),
        )
        .route(
            "/v1/deletion-requests/cleanup",
            post(deletions::cleanup),
        )
        .route(
            "/v1/deletion-requests/{id}",
            get(deletions::get_deletion_request),
        )
        .route("/v1/stats", get(admin::stats))
        .route("/admin/test-email", post(admin::test_email))
        .layer(middleware::from_fn_with_state(state.clone(), require_admin));

    let mut router = Router::new()
        .merge(public)
        .merge(protected)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::max(state.max_body_bytes))
        .layer(TraceLayer::new_for_http());

    if let Some(cors) = cors_layer(&state.cors_origins) {
        router = router.layer(cors);
    }

    router.with_state(state)
}

fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    if origins.is_empty() {
        return None;
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(origin = %o, error = %e, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods(Any)
            .allow_headers(Any),
    )
}

/// Turn a body rejection into a JSON 400.
pub(crate) fn bad_body(rejection: &JsonRejection) -> ServerError {
    ServerError::BadRequest(rejection.body_text())
}
