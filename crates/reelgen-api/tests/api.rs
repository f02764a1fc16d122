//! HTTP surface tests against an in-process router.

mod common;

use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use common::test_app;
use reelgen_api::ApiConfig;
use serde_json::{json, Value};
use tokio_test::assert_ok;
use tower::ServiceExt;

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    let body = body.to_string();
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::CONTENT_LENGTH, body.len())
        .body(Body::from(body))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn wait_for_status(router: &Router, run_id: &str, want: &str) -> Value {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let (_, body) = send(router, get(&format!("/api/generate/{}", run_id))).await;
            if body["status"] == want {
                return body;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("run never reached {}", want))
}

#[tokio::test]
async fn test_generate_then_poll_until_done() {
    let app = test_app(ApiConfig::default(), false);

    let (status, body) = send(
        &app.router,
        post_json("/api/generate", json!({"prompt": "walking on the beach at sunset"})),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let run_id = body["run_id"].as_str().unwrap().to_string();
    assert_eq!(body["status_url"], format!("/api/generate/{}", run_id));

    let done = wait_for_status(&app.router, &run_id, "done").await;
    assert_eq!(done["progress"], 100);
    assert_eq!(done["flow"], "ambience");
    let video_url = done["video_url"].as_str().unwrap();
    assert!(video_url.starts_with("/assets/videos/"));

    // The finished clip is served from the public asset directory
    let response = app.router.clone().oneshot(get(video_url)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"mixed");
}

#[tokio::test]
async fn test_invalid_intent_is_rejected() {
    let app = test_app(ApiConfig::default(), false);

    let (status, body) = send(&app.router, post_json("/api/generate", json!({"prompt": "  "}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "empty_prompt");

    let (status, body) = send(
        &app.router,
        post_json(
            "/api/generate",
            json!({"prompt": "beach", "persona": {"trigger": " "}}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "blank_persona_trigger");

    let (status, _) = send(
        &app.router,
        post_json("/api/generate", json!({"prompt": "x".repeat(5000)})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_unusable_aspect_ratio_is_rejected() {
    let app = test_app(ApiConfig::default(), false);

    for aspect_ratio in [
        json!({"width": 0, "height": 0}),
        json!({"width": 0, "height": 16}),
        json!("0:16"),
        json!("1:100"),
    ] {
        let (status, body) = send(
            &app.router,
            post_json(
                "/api/generate",
                json!({"prompt": "beach", "aspect_ratio": aspect_ratio}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", aspect_ratio);
        assert_eq!(body["code"], "invalid_body");
        assert!(body["detail"].as_str().unwrap().contains("Aspect ratio"));
    }

    // Nothing was admitted, so a valid request still goes through
    let (status, _) = send(
        &app.router,
        post_json(
            "/api/generate",
            json!({"prompt": "beach", "aspect_ratio": "16:9"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
}

#[tokio::test]
async fn test_malformed_json_is_a_bad_request() {
    let app = test_app(ApiConfig::default(), false);

    let request = Request::builder()
        .method("POST")
        .uri("/api/generate")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"prompt\": "))
        .unwrap();
    let (status, body) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "invalid_body");
}

#[tokio::test]
async fn test_status_of_unknown_and_malformed_runs() {
    let app = test_app(ApiConfig::default(), false);

    let (status, _) = send(
        &app.router,
        get("/api/generate/550e8400-e29b-41d4-a716-446655440000"),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app.router, get("/api/generate/not-a-run")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("Invalid run ID"));
}

#[tokio::test]
async fn test_cancel_running_run() {
    let app = test_app(ApiConfig::default(), true);

    let (_, body) = send(
        &app.router,
        post_json("/api/generate", json!({"prompt": "city street at night"})),
    )
    .await;
    let run_id = body["run_id"].as_str().unwrap().to_string();
    wait_for_status(&app.router, &run_id, "synthesizing").await;

    let (status, body) = send(
        &app.router,
        post_json(&format!("/api/generate/{}/cancel", run_id), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "canceled");

    // Cancelling again leaves the record unchanged
    let (status, body) = send(
        &app.router,
        post_json(&format!("/api/generate/{}/cancel", run_id), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "canceled");

    tokio::time::timeout(Duration::from_secs(5), async {
        while app.registry.active_runs() > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn test_rate_limit_applies_per_client() {
    let config = ApiConfig {
        rate_limit_rps: 1,
        ..ApiConfig::default()
    };
    let app = test_app(config, false);

    let request = || {
        Request::builder()
            .uri("/api/generate/not-a-run")
            .header("X-Forwarded-For", "203.0.113.9")
            .body(Body::empty())
            .unwrap()
    };
    let (first, _) = send(&app.router, request()).await;
    assert_eq!(first, StatusCode::BAD_REQUEST);

    let response = app.router.clone().oneshot(request()).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()[header::RETRY_AFTER], "1");
}

#[tokio::test]
async fn test_health_and_security_headers() {
    let app = test_app(ApiConfig::default(), false);

    let response = app.router.clone().oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["x-content-type-options"], "nosniff");
    assert!(response.headers().contains_key("x-request-id"));

    let bytes = assert_ok!(axum::body::to_bytes(response.into_body(), usize::MAX).await);
    let body: Value = assert_ok!(serde_json::from_slice(&bytes));
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["active_runs"], 0);
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let config = ApiConfig {
        max_body_size: 64,
        ..ApiConfig::default()
    };
    let app = test_app(config, false);

    let (status, _) = send(
        &app.router,
        post_json("/api/generate", json!({"prompt": "y".repeat(500)})),
    )
    .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_ready_reports_asset_directory() {
    let app = test_app(ApiConfig::default(), false);

    // FFmpeg may be absent on the test host; the asset check must pass regardless
    let (status, body) = send(&app.router, get("/ready")).await;
    assert!(status == StatusCode::OK || status == StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["checks"]["assets"]["status"], "ok");
}
