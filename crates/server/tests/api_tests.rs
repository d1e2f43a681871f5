use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::http::{self, HeaderMap, Request, StatusCode};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{Duration, TimeZone, Utc};
use serde_json::{Value, json};
use tower::ServiceExt;

use farmgate_blob::MemoryBlobStore;
use farmgate_core::ManualClock;
use farmgate_email::EmailConfig;
use farmgate_email::testing::RecordingBackend;
use farmgate_moderation::{
    ModerationMetrics, NotificationConfig, NotificationDispatcher, PhotoService,
};
use farmgate_server::api::AppState;
use farmgate_server::auth::AuthProvider;
use farmgate_server::auth::api_key::hash_api_key;
use farmgate_server::config::{ApiKeyConfig, AuthConfig};
use farmgate_state_memory::MemoryStateStore;

const ADMIN_KEY: &str = "farmgate-test-admin-key";

// -- Helpers --------------------------------------------------------------

struct TestApp {
    app: axum::Router,
    clock: Arc<ManualClock>,
    email: Arc<RecordingBackend>,
}

fn build_test_app(auth_enabled: bool) -> TestApp {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap(),
    ));
    let metrics = Arc::new(ModerationMetrics::default());
    let service = PhotoService::builder()
        .state(Arc::new(MemoryStateStore::new()))
        .blobs(Arc::new(MemoryBlobStore::new()))
        .clock(Arc::<ManualClock>::clone(&clock))
        .metrics(Arc::clone(&metrics))
        .build()
        .expect("service should build");

    let email = Arc::new(RecordingBackend::new());
    let notifier = NotificationDispatcher::new(
        Arc::<RecordingBackend>::clone(&email),
        EmailConfig::default(),
        NotificationConfig::default(),
        metrics,
    )
    .expect("templates should compile");

    let auth = AuthProvider::from_config(&AuthConfig {
        enabled: auth_enabled,
        api_keys: vec![ApiKeyConfig {
            name: "moderator".into(),
            key_hash: hash_api_key(ADMIN_KEY),
        }],
    })
    .expect("auth config should be valid")
    .map(Arc::new);

    let state = AppState {
        service: Arc::new(service),
        notifier: Arc::new(notifier),
        auth,
        max_body_bytes: 8 * 1024 * 1024,
        cors_origins: Vec::new(),
    };

    TestApp {
        app: farmgate_server::api::router(state),
        clock,
        email,
    }
}

fn png_data_url() -> String {
    let img = image::RgbImage::from_pixel(16, 12, image::Rgb([90, 140, 60]));
    let mut out = std::io::Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    format!("data:image/png;base64,{}", STANDARD.encode(out.into_inner()))
}

fn submission(shop_id: &str) -> Value {
    json!({
        "shop_id": shop_id,
        "shop_name": "Hill Farm Shop",
        "submitter_name": "Ann Smith",
        "submitter_email": "ann@example.com",
        "description": "The shop front on a sunny morning",
        "photo_data": png_data_url(),
    })
}

struct TestResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl TestResponse {
    fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("body should be JSON")
    }
}

async fn send(
    app: &axum::Router,
    method: http::Method,
    uri: &str,
    body: Option<Value>,
    api_key: Option<&str>,
) -> TestResponse {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(key) = api_key {
        builder = builder.header("x-api-key", key);
    }
    let request = match body {
        Some(body) => builder
            .header(http::header::CONTENT_TYPE, "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    TestResponse {
        status,
        headers,
        body,
    }
}

async fn submit(app: &axum::Router, shop_id: &str) -> String {
    let resp = send(
        app,
        http::Method::POST,
        "/v1/photos",
        Some(submission(shop_id)),
        None,
    )
    .await;
    assert_eq!(resp.status, StatusCode::CREATED);
    resp.json()["submission_id"].as_str().unwrap().to_owned()
}

async fn moderate(app: &axum::Router, id: &str, status: &str) -> TestResponse {
    send(
        app,
        http::Method::PATCH,
        &format!("/v1/photos/{id}"),
        Some(json!({"action": "moderate", "status": status})),
        Some(ADMIN_KEY),
    )
    .await
}

async fn request_deletion(app: &axum::Router, photo_id: &str) -> TestResponse {
    send(
        app,
        http::Method::POST,
        "/v1/deletion-requests",
        Some(json!({
            "photo_id": photo_id,
            "requester_name": "Ann Smith",
            "requester_email": "ann@example.com",
            "requester_role": "submitter",
            "reason": "I took this photo of the wrong shop",
        })),
        None,
    )
    .await
}

// -- Tests ----------------------------------------------------------------

#[tokio::test]
async fn health_returns_200() {
    let t = build_test_app(false);
    let resp = send(&t.app, http::Method::GET, "/health", None, None).await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["metrics"]["submissions"], 0);
}

#[tokio::test]
async fn submit_creates_pending_photo() {
    let t = build_test_app(false);
    let id = submit(&t.app, "hill-farm").await;
    assert!(id.starts_with("photo_"));

    let resp = send(&t.app, http::Method::GET, "/v1/photos/pending", None, None).await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["count"], 1);
    assert_eq!(body["photos"][0]["id"], id.as_str());
    assert_eq!(body["photos"][0]["status"], "pending");
}

#[tokio::test]
async fn invalid_submission_lists_every_problem() {
    let t = build_test_app(false);
    let resp = send(
        &t.app,
        http::Method::POST,
        "/v1/photos",
        Some(json!({
            "shop_id": "hill-farm",
            "shop_name": "Hill Farm Shop",
            "submitter_email": "not-an-email",
            "description": "Front",
            "photo_data": png_data_url(),
        })),
        None,
    )
    .await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    let body = resp.json();
    let details: Vec<&str> = body["details"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d.as_str().unwrap())
        .collect();
    assert!(details.contains(&"Your name is required"));
    assert!(details.contains(&"Please enter a valid email address"));
}

#[tokio::test]
async fn malformed_json_is_400() {
    let t = build_test_app(false);
    let request = Request::builder()
        .method(http::Method::POST)
        .uri("/v1/photos")
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let resp = t.app.clone().oneshot(request).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn images_are_public_only_after_approval() {
    let t = build_test_app(false);
    let id = submit(&t.app, "hill-farm").await;

    let image_uri = format!("/v1/photos/{id}/image");
    let resp = send(&t.app, http::Method::GET, &image_uri, None, None).await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);

    // Admins can see it while it waits for review.
    let resp = send(
        &t.app,
        http::Method::GET,
        &format!("/admin/photos/{id}/image"),
        None,
        None,
    )
    .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.headers[http::header::CACHE_CONTROL], "private, no-store");

    let resp = moderate(&t.app, &id, "approved").await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["photo"]["status"], "approved");

    let resp = send(&t.app, http::Method::GET, &image_uri, None, None).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.headers[http::header::CONTENT_TYPE], "image/png");
    assert!(
        resp.headers[http::header::CACHE_CONTROL]
            .to_str()
            .unwrap()
            .starts_with("public")
    );
    assert!(!resp.body.is_empty());

    let resp = send(
        &t.app,
        http::Method::GET,
        &format!("/v1/photos/{id}/thumbnail"),
        None,
        None,
    )
    .await;
    assert_eq!(resp.status, StatusCode::OK);
}

#[tokio::test]
async fn malformed_photo_id_is_400() {
    let t = build_test_app(false);
    let resp = send(
        &t.app,
        http::Method::GET,
        "/v1/photos/..%2Fetc%2Fpasswd/image",
        None,
        None,
    )
    .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn shop_listing_shows_only_approved_photos() {
    let t = build_test_app(false);
    let approved = submit(&t.app, "hill-farm").await;
    let _pending = submit(&t.app, "hill-farm").await;
    let _other_shop = submit(&t.app, "dale-farm").await;
    moderate(&t.app, &approved, "approved").await;

    let resp = send(
        &t.app,
        http::Method::GET,
        "/v1/shops/hill-farm/photos",
        None,
        None,
    )
    .await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["count"], 1);
    assert_eq!(body["photos"][0]["id"], approved.as_str());

    let resp = send(
        &t.app,
        http::Method::GET,
        "/v1/shops/hill-farm/photo-count",
        None,
        None,
    )
    .await;
    assert_eq!(resp.json()["count"], 1);

    let resp = send(
        &t.app,
        http::Method::GET,
        "/v1/photos?shop_id=hill-farm&status=pending",
        None,
        None,
    )
    .await;
    assert_eq!(resp.json()["count"], 1);
}

#[tokio::test]
async fn rejection_records_default_reason() {
    let t = build_test_app(false);
    let id = submit(&t.app, "hill-farm").await;
    let resp = moderate(&t.app, &id, "rejected").await;
    assert_eq!(resp.status, StatusCode::OK);
    let photo = &resp.json()["photo"];
    assert_eq!(photo["status"], "rejected");
    assert!(photo["rejection_reason"].as_str().is_some());
}

#[tokio::test]
async fn unknown_photo_is_404() {
    let t = build_test_app(false);
    let resp = moderate(&t.app, "photo_0000000000000000", "approved").await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert!(resp.json()["error"].as_str().is_some());
}

#[tokio::test]
async fn admin_routes_require_api_key_when_enabled() {
    let t = build_test_app(true);

    let resp = send(&t.app, http::Method::GET, "/v1/photos/pending", None, None).await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);

    let resp = send(
        &t.app,
        http::Method::GET,
        "/v1/photos/pending",
        None,
        Some("wrong-key"),
    )
    .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);

    let resp = send(
        &t.app,
        http::Method::GET,
        "/v1/photos/pending",
        None,
        Some(ADMIN_KEY),
    )
    .await;
    assert_eq!(resp.status, StatusCode::OK);

    let request = Request::builder()
        .uri("/v1/stats")
        .header(http::header::AUTHORIZATION, format!("Bearer {ADMIN_KEY}"))
        .body(Body::empty())
        .unwrap();
    let resp = t.app.clone().oneshot(request).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    // Public routes stay open.
    let resp = send(&t.app, http::Method::GET, "/health", None, None).await;
    assert_eq!(resp.status, StatusCode::OK);
}

#[tokio::test]
async fn reviewer_defaults_to_api_key_name() {
    let t = build_test_app(true);
    let id = submit(&t.app, "hill-farm").await;
    let resp = moderate(&t.app, &id, "approved").await;
    assert_eq!(resp.json()["photo"]["reviewed_by"], "moderator");
}

#[tokio::test]
async fn deletion_flow_with_recovery_window() {
    let t = build_test_app(false);
    let id = submit(&t.app, "hill-farm").await;
    moderate(&t.app, &id, "approved").await;

    let resp = request_deletion(&t.app, &id).await;
    assert_eq!(resp.status, StatusCode::CREATED);
    let request_id = resp.json()["request_id"].as_str().unwrap().to_owned();

    // A second request while one is open conflicts.
    let resp = request_deletion(&t.app, &id).await;
    assert_eq!(resp.status, StatusCode::CONFLICT);

    let resp = send(
        &t.app,
        http::Method::GET,
        "/v1/deletion-requests",
        None,
        None,
    )
    .await;
    assert_eq!(resp.json()["count"], 1);
    assert_eq!(resp.json()["requests"][0]["id"], request_id.as_str());

    let resp = send(
        &t.app,
        http::Method::PATCH,
        &format!("/v1/photos/{id}"),
        Some(json!({
            "action": "review_deletion",
            "request_id": request_id,
            "decision": "approved",
        })),
        None,
    )
    .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["photo"]["status"], "deleted");
    assert!(resp.json()["photo"]["can_recover_until"].is_string());

    // Deleted photos drop out of public view.
    let resp = send(
        &t.app,
        http::Method::GET,
        &format!("/v1/photos/{id}/image"),
        None,
        None,
    )
    .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);

    let resp = send(
        &t.app,
        http::Method::GET,
        "/v1/deletion-requests?type=recoverable",
        None,
        None,
    )
    .await;
    assert_eq!(resp.json()["count"], 1);
    assert_eq!(resp.json()["photos"][0]["id"], id.as_str());

    let resp = send(
        &t.app,
        http::Method::GET,
        &format!("/v1/deletion-requests/{request_id}"),
        None,
        None,
    )
    .await;
    assert_eq!(resp.json()["status"], "approved");

    t.clock.advance(Duration::hours(3));
    let resp = send(
        &t.app,
        http::Method::PATCH,
        &format!("/v1/photos/{id}"),
        Some(json!({"action": "recover"})),
        None,
    )
    .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["photo"]["status"], "approved");
}

#[tokio::test]
async fn recovery_after_window_is_410() {
    let t = build_test_app(false);
    let id = submit(&t.app, "hill-farm").await;
    moderate(&t.app, &id, "approved").await;
    let request_id = request_deletion(&t.app, &id).await.json()["request_id"]
        .as_str()
        .unwrap()
        .to_owned();
    send(
        &t.app,
        http::Method::PATCH,
        &format!("/v1/photos/{id}"),
        Some(json!({
            "action": "review_deletion",
            "request_id": request_id,
            "decision": "approved",
        })),
        None,
    )
    .await;

    t.clock.advance(Duration::hours(4) + Duration::minutes(1));
    let resp = send(
        &t.app,
        http::Method::PATCH,
        &format!("/v1/photos/{id}"),
        Some(json!({"action": "recover"})),
        None,
    )
    .await;
    assert_eq!(resp.status, StatusCode::GONE);

    let resp = send(
        &t.app,
        http::Method::POST,
        "/v1/deletion-requests/cleanup",
        None,
        None,
    )
    .await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["cleaned_count"], 1);

    let resp = send(
        &t.app,
        http::Method::GET,
        &format!("/v1/photos/{id}"),
        None,
        None,
    )
    .await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);

    // The request record outlives the photo.
    let resp = send(
        &t.app,
        http::Method::GET,
        &format!("/v1/deletion-requests/{request_id}"),
        None,
        None,
    )
    .await;
    assert_eq!(resp.status, StatusCode::OK);
}

#[tokio::test]
async fn recovering_a_live_photo_is_422() {
    let t = build_test_app(false);
    let id = submit(&t.app, "hill-farm").await;
    let resp = send(
        &t.app,
        http::Method::PATCH,
        &format!("/v1/photos/{id}"),
        Some(json!({"action": "recover"})),
        None,
    )
    .await;
    assert_eq!(resp.status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn review_for_another_photo_is_400() {
    let t = build_test_app(false);
    let first = submit(&t.app, "hill-farm").await;
    let second = submit(&t.app, "hill-farm").await;
    let request_id = request_deletion(&t.app, &first).await.json()["request_id"]
        .as_str()
        .unwrap()
        .to_owned();

    let resp = send(
        &t.app,
        http::Method::PATCH,
        &format!("/v1/photos/{second}"),
        Some(json!({
            "action": "review_deletion",
            "request_id": request_id,
            "decision": "rejected",
        })),
        None,
    )
    .await;
    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn submitter_email_must_match() {
    let t = build_test_app(false);
    let id = submit(&t.app, "hill-farm").await;
    let resp = send(
        &t.app,
        http::Method::POST,
        "/v1/deletion-requests",
        Some(json!({
            "photo_id": id,
            "requester_name": "Someone Else",
            "requester_email": "other@example.com",
            "requester_role": "submitter",
            "reason": "I would like this photo removed",
        })),
        None,
    )
    .await;
    assert_eq!(resp.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn stats_count_photos_by_status() {
    let t = build_test_app(false);
    let a = submit(&t.app, "hill-farm").await;
    let _b = submit(&t.app, "dale-farm").await;
    moderate(&t.app, &a, "approved").await;

    let resp = send(&t.app, http::Method::GET, "/v1/stats", None, None).await;
    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["photos"]["total"], 2);
    assert_eq!(body["photos"]["approved"], 1);
    assert_eq!(body["photos"]["pending"], 1);
    assert_eq!(body["photos"]["shops"], 2);
    assert_eq!(body["metrics"]["submissions"], 2);
    assert_eq!(body["metrics"]["approvals"], 1);
}

#[tokio::test]
async fn test_email_goes_to_admin_by_default() {
    let t = build_test_app(false);
    let resp = send(&t.app, http::Method::POST, "/admin/test-email", None, None).await;
    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(resp.json()["status"], "recorded");

    let resp = send(
        &t.app,
        http::Method::POST,
        "/admin/test-email",
        Some(json!({"to": "ops@example.com"})),
        None,
    )
    .await;
    assert_eq!(resp.status, StatusCode::OK);

    let sent = t.email.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].to, EmailConfig::default().admin_address);
    assert_eq!(sent[1].to, "ops@example.com");
}

#[tokio::test]
async fn openapi_json_lists_routes() {
    let t = build_test_app(false);
    let resp = send(
        &t.app,
        http::Method::GET,
        "/api-doc/openapi.json",
        None,
        None,
    )
    .await;
    assert_eq!(resp.status, StatusCode::OK);
    let doc = resp.json();
    assert!(doc["paths"]["/v1/photos"].is_object());
    assert!(doc["paths"]["/v1/deletion-requests"].is_object());
    assert!(doc["components"]["securitySchemes"]["api_key"].is_object());
}

#[tokio::test]
async fn swagger_ui_returns_200() {
    let t = build_test_app(false);
    let resp = send(&t.app, http::Method::GET, "/swagger-ui/", None, None).await;
    assert_eq!(resp.status, StatusCode::OK);
}

#[tokio::test]
async fn admin_role_deletion_requires_api_key() {
    let t = build_test_app(true);
    let id = submit(&t.app, "hill-farm").await;
    let body = json!({
        "photo_id": id,
        "requester_name": "Site Admin",
        "requester_email": "admin@example.com",
        "requester_role": "admin",
        "reason": "Duplicate of an existing gallery photo",
    });

    let resp = send(
        &t.app,
        http::Method::POST,
        "/v1/deletion-requests",
        Some(body.clone()),
        None,
    )
    .await;
    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);

    let resp = send(
        &t.app,
        http::Method::POST,
        "/v1/deletion-requests",
        Some(body),
        Some(ADMIN_KEY),
    )
    .await;
    assert_eq!(resp.status, StatusCode::CREATED);
}
