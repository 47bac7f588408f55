//! Integration tests for the public banner, the token check, and general
//! HTTP behaviour.

mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use common::{authed_get, body_json, get, TOKEN};

// ---------------------------------------------------------------------------
// Test: GET / is public and reports readiness
// ---------------------------------------------------------------------------

#[tokio::test]
async fn index_is_public() {
    let app = common::build_test_app();
    let response = app.send(get("/")).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "running");
    assert_eq!(json["ready"], true);
    assert!(json["name"].is_string());
}

// ---------------------------------------------------------------------------
// Test: /api/health requires the worker token
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_without_token_is_unauthorized() {
    let app = common::build_test_app();
    let response = app.send(get("/api/health")).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Unauthorized");
    assert_eq!(json["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn health_with_wrong_token_is_unauthorized() {
    let app = common::build_test_app();
    let request = Request::builder()
        .uri("/api/health")
        .header("authorization", "Bearer nope")
        .body(Body::empty())
        .unwrap();

    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn health_accepts_bearer_token() {
    let app = common::build_test_app();
    let response = app.send(authed_get("/api/health")).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["message"], "Worker is ready");
}

#[tokio::test]
async fn health_accepts_query_token() {
    let app = common::build_test_app();
    let response = app.send(get(&format!("/api/health?token={TOKEN}"))).await;

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn health_accepts_bare_header_token() {
    let app = common::build_test_app();
    let request = Request::builder()
        .uri("/api/health")
        .header("authorization", TOKEN)
        .body(Body::empty())
        .unwrap();

    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::OK);
}

// ---------------------------------------------------------------------------
// Test: Unknown route returns 404
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_route_returns_404() {
    let app = common::build_test_app();
    let response = app.send(get("/this-route-does-not-exist")).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Test: x-request-id header is present in response
// ---------------------------------------------------------------------------

#[tokio::test]
async fn response_contains_x_request_id_header() {
    let app = common::build_test_app();
    let response = app.send(get("/")).await;

    let request_id = response
        .headers()
        .get("x-request-id")
        .expect("Response must contain an x-request-id header");
    assert_eq!(request_id.to_str().unwrap().len(), 36);
}

// ---------------------------------------------------------------------------
// Test: CORS preflight for a configured origin
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cors_preflight_allows_configured_origin() {
    let app = common::build_test_app();
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/commands")
        .header("Origin", "http://localhost:5173")
        .header("Access-Control-Request-Method", "POST")
        .header("Access-Control-Request-Headers", "authorization")
        .body(Body::empty())
        .unwrap();

    let response = app.send(request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("access-control-allow-origin").unwrap(),
        "http://localhost:5173"
    );
}
