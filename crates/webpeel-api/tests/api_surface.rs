//! End-to-end tests over the router with in-memory stores.

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use std::sync::Arc;
use tower::ServiceExt;
use webpeel_api::auth::MemoryKeyStore;
use webpeel_api::{router, AppState};
use webpeel_facade::WebPeel;
use webpeel_tracking::ChangeTracker;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const API_KEY: &str = "pk-test-key";

struct Harness {
    app: Router,
    _snapshots: tempfile::TempDir,
}

fn harness() -> Harness {
    let snapshots = tempfile::tempdir().unwrap();
    let peel = Arc::new(
        WebPeel::builder()
            .tracker(ChangeTracker::new(snapshots.path()))
            .build()
            .unwrap(),
    );
    let keys = MemoryKeyStore::new();
    keys.insert_plaintext(API_KEY, "acct-1");
    let state = AppState::for_tests(peel, Arc::new(keys));
    Harness {
        app: router(state),
        _snapshots: snapshots,
    }
}

fn get(path: &str) -> Request<Body> {
    Request::builder()
        .uri(path)
        .header("Authorization", format!("Bearer {}", API_KEY))
        .body(Body::empty())
        .unwrap()
}

fn post_json(path: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header("Authorization", format!("Bearer {}", API_KEY))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn health_is_public() {
    let h = harness();
    let response = h
        .app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn openapi_is_public_yaml() {
    let h = harness();
    let response = h
        .app
        .oneshot(
            Request::builder()
                .uri("/openapi.yaml")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "application/yaml");
}

#[tokio::test]
async fn protected_routes_require_a_key() {
    let h = harness();
    let response = h
        .app
        .oneshot(
            Request::builder()
                .uri("/v1/fetch?url=https://e.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["type"], "authentication_required");
    assert!(body["requestId"].is_string());
}

#[tokio::test]
async fn wrong_keys_are_rejected() {
    let h = harness();
    let response = h
        .app
        .oneshot(
            Request::builder()
                .uri("/v1/jobs")
                .header("X-API-Key", "nope")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = json_body(response).await;
    assert_eq!(body["error"]["type"], "invalid_key");
}

#[tokio::test]
async fn fetch_returns_result_with_quota_and_cache_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/page"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<html><head><title>Hello</title></head><body><article><p>A body of prose \
             that is comfortably longer than the main-content detector's one hundred \
             character minimum for acceptance.</p></article></body></html>",
        ))
        .mount(&server)
        .await;

    let h = harness();
    let response = h
        .app
        .clone()
        .oneshot(get(&format!("/v1/fetch?url={}/page", server.uri())))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(response.headers()["x-cache"], "MISS");
    assert_eq!(response.headers()["x-burst-limit"], "25");
    assert!(response.headers().contains_key("x-weekly-remaining"));
    assert!(response.headers().contains_key("x-extra-usage-enabled"));
    let body = json_body(response).await;
    assert_eq!(body["title"], "Hello");
    assert_eq!(body["fingerprint"].as_str().unwrap().len(), 16);

    // Second identical request is served from cache.
    let response = h
        .app
        .oneshot(get(&format!("/v1/fetch?url={}/page", server.uri())))
        .await
        .unwrap();
    assert_eq!(response.headers()["x-cache"], "HIT");
    assert!(response.headers().contains_key("x-cache-age"));
    let body = json_body(response).await;
    assert_eq!(body["method"], "cached");
}

#[tokio::test]
async fn invalid_urls_get_the_error_envelope() {
    let h = harness();
    let response = h
        .app
        .oneshot(get("/v1/fetch?url=ftp://nope"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = json_body(response).await;
    assert_eq!(body["error"]["type"], "invalid_url");
    assert!(body["error"]["hint"].is_string());
}

#[tokio::test]
async fn watch_lifecycle_create_list_delete() {
    let h = harness();

    let response = h
        .app
        .clone()
        .oneshot(post_json(
            "/v1/watch",
            serde_json::json!({
                "url": "https://watched.example.com/page",
                "checkIntervalMinutes": 30
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = json_body(response).await;
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(created["status"], "active");

    let response = h.app.clone().oneshot(get("/v1/watch")).await.unwrap();
    let body = json_body(response).await;
    assert_eq!(body["watches"].as_array().unwrap().len(), 1);

    let response = h
        .app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/v1/watch/{}", id))
                .header("Authorization", format!("Bearer {}", API_KEY))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = h.app.oneshot(get("/v1/watch")).await.unwrap();
    let body = json_body(response).await;
    assert!(body["watches"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn too_fast_watch_intervals_are_rejected() {
    let h = harness();
    let response = h
        .app
        .oneshot(post_json(
            "/v1/watch",
            serde_json::json!({ "url": "https://e.com", "checkIntervalMinutes": 1 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_jobs_are_404() {
    let h = harness();
    let response = h.app.oneshot(get("/v1/jobs/missing")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_body(response).await;
    assert_eq!(body["error"]["type"], "not_found");
}

#[tokio::test]
async fn batch_submission_returns_202_and_completes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "<html><body><article><p>Batch page body long enough to pass the detector's \
             minimum content threshold without any trouble at all here.</p></article></body></html>",
        ))
        .mount(&server)
        .await;

    let h = harness();
    let response = h
        .app
        .clone()
        .oneshot(post_json(
            "/v1/batch/scrape",
            serde_json::json!({ "urls": [format!("{}/a", server.uri())] }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = json_body(response).await;
    let id = body["id"].as_str().unwrap().to_string();

    // Poll until the background task finishes.
    let mut status = String::new();
    for _ in 0..50 {
        let response = h
            .app
            .clone()
            .oneshot(get(&format!("/v1/batch/scrape/{}", id)))
            .await
            .unwrap();
        let job = json_body(response).await;
        status = job["status"].as_str().unwrap().to_string();
        if status == "completed" {
            assert_eq!(job["completed"], 1);
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    }
    assert_eq!(status, "completed");
}

#[tokio::test]
async fn empty_batches_are_rejected() {
    let h = harness();
    let response = h
        .app
        .oneshot(post_json(
            "/v1/batch/scrape",
            serde_json::json!({ "urls": [] }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
