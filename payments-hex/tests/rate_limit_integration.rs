//! Integration tests for rate limiting middleware.
//!
//! These tests verify the HTTP-level behavior of rate limiting,
//! including 429 responses and proper integration with the middleware stack.

mod common;

use std::net::SocketAddr;

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use tower::ServiceExt;

use common::test_app;

/// Helper to make a health check request.
fn health_request() -> Request<Body> {
    Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap()
}

/// A payment request without an idempotency key; cheap 400, but still metered.
fn api_request(peer: &str) -> Request<Body> {
    forwarded_request(peer, None)
}

/// Same request arriving from `peer`, optionally carrying `X-Forwarded-For`.
fn forwarded_request(peer: &str, forwarded_for: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("POST").uri("/payments");
    if let Some(value) = forwarded_for {
        builder = builder.header("X-Forwarded-For", value);
    }
    let mut request = builder.body(Body::empty()).unwrap();
    let addr: SocketAddr = format!("{}:40000", peer).parse().unwrap();
    request.extensions_mut().insert(ConnectInfo(addr));
    request
}

#[tokio::test]
async fn test_rate_limiting_returns_429_when_exceeded() {
    let app = test_app(3, false).await;
    let router = app.server.router();

    for i in 1..=3 {
        let response = router.clone().oneshot(api_request("198.51.100.1")).await.unwrap();
        assert_ne!(
            response.status(),
            StatusCode::TOO_MANY_REQUESTS,
            "Request {} should not be rate limited (quota not yet exceeded)",
            i
        );
    }

    let response = router.clone().oneshot(api_request("198.51.100.1")).await.unwrap();
    assert_eq!(
        response.status(),
        StatusCode::TOO_MANY_REQUESTS,
        "Request should be rate limited after exceeding quota"
    );

    let content_type = response.headers().get("content-type").unwrap();
    assert!(content_type.to_str().unwrap().contains("application/json"));

    let body = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(
        json["error"]
            .as_str()
            .unwrap()
            .contains("Rate limit exceeded")
    );
    assert_eq!(json["retry_after_seconds"], 60);
}

#[tokio::test]
async fn test_rate_limiting_health_endpoint_bypassed() {
    let app = test_app(1, false).await;
    let router = app.server.router();

    for _ in 0..10 {
        let response = router.clone().oneshot(health_request()).await.unwrap();
        assert_eq!(
            response.status(),
            StatusCode::OK,
            "Health endpoint should not be rate limited"
        );
    }
}

#[tokio::test]
async fn test_rate_limiting_per_client_isolation() {
    let app = test_app(1, false).await;
    let router = app.server.router();

    let response = router.clone().oneshot(api_request("198.51.100.1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let response = router.clone().oneshot(api_request("198.51.100.1")).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    // Another client has its own quota.
    let response = router.clone().oneshot(api_request("198.51.100.2")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_rotating_forwarded_for_does_not_reset_quota() {
    let app = test_app(2, false).await;
    let router = app.server.router();

    let mut statuses = Vec::new();
    for i in 0..5 {
        let spoofed = format!("203.0.113.{}", i);
        let response = router
            .clone()
            .oneshot(forwarded_request("198.51.100.1", Some(&spoofed)))
            .await
            .unwrap();
        statuses.push(response.status());
    }

    assert_eq!(&statuses[..2], &[StatusCode::BAD_REQUEST; 2]);
    assert!(statuses[2..].iter().all(|s| *s == StatusCode::TOO_MANY_REQUESTS));
}
