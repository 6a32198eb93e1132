//! API Integration Tests
//!
//! Tests run against the in-memory store or a store that always fails; no
//! external services needed.
//!
//! Author: hephaex@gmail.com

use axum::{
    body::Body,
    http::{header, HeaderMap, Request, StatusCode},
    Router,
};
use proptest::prelude::*;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use warden_api::auth::{TokenIssuer, TokenKind, TokenPayload};
use warden_api::test_utils::{
    test_app, test_app_with, test_config, test_router, FailingStore, TestApp,
};
use warden_store::Repositories;

/// Helper to create a test request
fn create_json_request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json");

    match body {
        Some(json_body) => builder
            .body(Body::from(serde_json::to_string(&json_body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn bearer_request(method: &str, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);

    (status, headers, json)
}

fn set_cookies(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

fn credentials(email: &str) -> Value {
    json!({ "email": email, "name": "A", "password": "Pass123!" })
}

async fn sign_up(app: &Router, email: &str) -> Value {
    let (status, _, body) = send(
        app,
        create_json_request("POST", "/authentication/sign-up", Some(credentials(email))),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "sign-up failed: {body}");
    body
}

async fn refresh_with_body(app: &Router, refresh_token: &str) -> (StatusCode, Value) {
    let (status, _, body) = send(
        app,
        create_json_request(
            "POST",
            "/authentication/refresh-tokens",
            Some(json!({ "refreshToken": refresh_token })),
        ),
    )
    .await;
    (status, body)
}

// =============================================================================
// Health Check Tests
// =============================================================================

#[tokio::test]
async fn test_health_check() {
    let TestApp { router, .. } = test_app();

    let (status, headers, json) = send(
        &router,
        Request::builder().uri("/health").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
    assert_eq!(headers.get(header::X_FRAME_OPTIONS).unwrap(), "DENY");
    assert!(headers.get(header::CACHE_CONTROL).is_none());
}

#[tokio::test]
async fn test_readiness_check() {
    let TestApp { router, .. } = test_app();

    let (status, _, json) = send(
        &router,
        Request::builder().uri("/ready").body(Body::empty()).unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["ready"], true);
    assert_eq!(json["checks"]["database"], true);
}

// =============================================================================
// Sign-up / Sign-in
// =============================================================================

#[tokio::test]
async fn test_full_token_lifecycle() {
    let TestApp { router, store, .. } = test_app();

    let tokens = sign_up(&router, "a@x.com").await;
    assert!(tokens["accessToken"].is_string());
    assert!(tokens["refreshToken"].is_string());
    assert_eq!(tokens["tokenType"], "Bearer");
    assert_eq!(store.refresh_token_count().await, 1);

    let (status, _, signed_in) = send(
        &router,
        create_json_request(
            "POST",
            "/authentication/sign-in",
            Some(json!({ "email": "a@x.com", "password": "Pass123!" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_ne!(signed_in["refreshToken"], tokens["refreshToken"]);
    assert_eq!(store.refresh_token_count().await, 1);

    let access = signed_in["accessToken"].as_str().unwrap();
    let (status, _, body) = send(
        &router,
        bearer_request("POST", "/authentication/sign-out", access),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["message"].is_string());
    assert_eq!(store.refresh_token_count().await, 0);

    let refresh = signed_in["refreshToken"].as_str().unwrap();
    let (status, body) = refresh_with_body(&router, refresh).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_sign_up_duplicate_email_conflict() {
    let TestApp { router, store, .. } = test_app();

    sign_up(&router, "dup@example.com").await;

    let (status, _, body) = send(
        &router,
        create_json_request(
            "POST",
            "/authentication/sign-up",
            Some(credentials("DUP@example.com")),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "User already exists!");
    assert_eq!(store.user_count().await, 1);
}

#[tokio::test]
async fn test_sign_in_failures_are_indistinguishable() {
    let TestApp { router, .. } = test_app();
    sign_up(&router, "known@example.com").await;

    let (unknown_status, _, unknown_body) = send(
        &router,
        create_json_request(
            "POST",
            "/authentication/sign-in",
            Some(json!({ "email": "nobody@example.com", "password": "Pass123!" })),
        ),
    )
    .await;
    let (wrong_status, _, wrong_body) = send(
        &router,
        create_json_request(
            "POST",
            "/authentication/sign-in",
            Some(json!({ "email": "known@example.com", "password": "Wrong123!" })),
        ),
    )
    .await;

    assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_body, wrong_body);
}

#[tokio::test]
async fn test_sign_up_validation_messages() {
    let TestApp { router, store, .. } = test_app();

    let (status, _, body) = send(
        &router,
        create_json_request(
            "POST",
            "/authentication/sign-up",
            Some(json!({ "email": "not-an-email", "password": "password" })),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    let messages: Vec<&str> = body["fields"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["message"].as_str().unwrap())
        .collect();
    assert!(messages.contains(&"email must be an email"));
    assert!(messages.contains(&"name should not be empty"));
    assert!(messages.contains(&"Password must contain 1 letter, 1 number & 1 special character"));
    assert_eq!(store.user_count().await, 0);
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let TestApp { router, .. } = test_app();

    let request = Request::builder()
        .method("POST")
        .uri("/authentication/sign-in")
        .header("Content-Type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, _, body) = send(&router, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

// =============================================================================
// Refresh
// =============================================================================

#[tokio::test]
async fn test_refresh_rotates_and_rejects_replay() {
    let TestApp { router, .. } = test_app();

    let tokens = sign_up(&router, "rotate@example.com").await;
    let rt1 = tokens["refreshToken"].as_str().unwrap();

    let (status, rotated) = refresh_with_body(&router, rt1).await;
    assert_eq!(status, StatusCode::OK);
    let rt2 = rotated["refreshToken"].as_str().unwrap();
    assert_ne!(rt1, rt2);

    let (status, _) = refresh_with_body(&router, rt1).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = refresh_with_body(&router, rt2).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_refresh_from_cookie() {
    let TestApp { router, .. } = test_app();

    let tokens = sign_up(&router, "cookie-refresh@example.com").await;
    let rt = tokens["refreshToken"].as_str().unwrap();

    let request = Request::builder()
        .method("POST")
        .uri("/authentication/refresh-tokens")
        .header(header::COOKIE, format!("refreshToken={rt}"))
        .body(Body::empty())
        .unwrap();
    let (status, headers, body) = send(&router, request).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["accessToken"].is_string());
    assert_eq!(set_cookies(&headers).len(), 2);
}

#[tokio::test]
async fn test_refresh_rejects_missing_and_wrong_kind() {
    let TestApp { router, .. } = test_app();

    let (status, _, _) = send(
        &router,
        create_json_request("POST", "/authentication/refresh-tokens", None),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let tokens = sign_up(&router, "kind@example.com").await;
    let access = tokens["accessToken"].as_str().unwrap();
    let (status, _) = refresh_with_body(&router, access).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = refresh_with_body(&router, "garbage").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Guard and protected routes
// =============================================================================

#[tokio::test]
async fn test_me_hides_credentials() {
    let TestApp { router, .. } = test_app();

    let tokens = sign_up(&router, "me@example.com").await;
    let access = tokens["accessToken"].as_str().unwrap();

    let (status, headers, body) =
        send(&router, bearer_request("GET", "/authentication/me", access)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "me@example.com");
    assert_eq!(body["name"], "A");
    assert!(body.get("passwordHash").is_none());
    assert!(body.get("password_hash").is_none());
    assert!(body.get("secret").is_none());
    assert_eq!(headers.get(header::CACHE_CONTROL).unwrap(), "no-store");

    let (status, _, _) = send(&router, bearer_request("POST", "/authentication/me", access)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_me_accepts_cookie_token() {
    let TestApp { router, .. } = test_app();

    let tokens = sign_up(&router, "cookie-me@example.com").await;
    let access = tokens["accessToken"].as_str().unwrap();

    let request = Request::builder()
        .uri("/authentication/me")
        .header(header::COOKIE, format!("theme=dark; accessToken={access}"))
        .body(Body::empty())
        .unwrap();
    let (status, _, body) = send(&router, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "cookie-me@example.com");
}

#[tokio::test]
async fn test_guard_rejections_share_one_response() {
    let TestApp { router, .. } = test_app();

    let tokens = sign_up(&router, "guard@example.com").await;
    let refresh = tokens["refreshToken"].as_str().unwrap();

    let (no_token_status, _, no_token_body) = send(
        &router,
        Request::builder()
            .uri("/authentication/me")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    let (garbage_status, _, garbage_body) =
        send(&router, bearer_request("GET", "/authentication/me", "a.b.c")).await;
    let (kind_status, _, kind_body) =
        send(&router, bearer_request("GET", "/authentication/me", refresh)).await;

    assert_eq!(no_token_status, StatusCode::UNAUTHORIZED);
    assert_eq!(garbage_status, StatusCode::UNAUTHORIZED);
    assert_eq!(kind_status, StatusCode::UNAUTHORIZED);
    assert_eq!(no_token_body, garbage_body);
    assert_eq!(garbage_body, kind_body);
}

#[tokio::test]
async fn test_sign_out_requires_authentication() {
    let TestApp { router, .. } = test_app();

    let (status, _, _) = send(
        &router,
        create_json_request("POST", "/authentication/sign-out", None),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Sign-out policies
// =============================================================================

#[tokio::test]
async fn test_sign_out_revokes_access_tokens_when_rotating() {
    let TestApp { router, .. } = test_app_with(test_config(true));

    let tokens = sign_up(&router, "rotating@example.com").await;
    let access = tokens["accessToken"].as_str().unwrap();

    let (status, headers, _) =
        send(&router, bearer_request("POST", "/authentication/sign-out", access)).await;
    assert_eq!(status, StatusCode::OK);

    let cleared = set_cookies(&headers);
    assert_eq!(cleared.len(), 3);
    for name in ["accessToken=", "refreshToken=", "session-id="] {
        assert!(cleared
            .iter()
            .any(|c| c.starts_with(name) && c.contains("Max-Age=0")));
    }

    let (status, _, _) = send(&router, bearer_request("GET", "/authentication/me", access)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_sign_out_keeps_access_tokens_without_rotation() {
    let TestApp { router, store, .. } = test_app_with(test_config(false));

    let tokens = sign_up(&router, "keeping@example.com").await;
    let access = tokens["accessToken"].as_str().unwrap();
    let refresh = tokens["refreshToken"].as_str().unwrap();

    let (status, _, _) =
        send(&router, bearer_request("POST", "/authentication/sign-out", access)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(store.refresh_token_count().await, 0);

    let (status, _, _) = send(&router, bearer_request("GET", "/authentication/me", access)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = refresh_with_body(&router, refresh).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Storage outage
// =============================================================================

#[tokio::test]
async fn test_storage_outage_is_an_internal_error() {
    let config = test_config(true);
    let issuer = TokenIssuer::new(&config.auth);
    let (router, _) = test_router(config, Repositories::from_store(Arc::new(FailingStore)));

    let payload = TokenPayload {
        sub: uuid::Uuid::new_v4().to_string(),
        email: "down@example.com".to_string(),
    };
    let access = issuer
        .create_token(&payload, "s", TokenKind::Access)
        .unwrap();
    let refresh = issuer
        .create_token(&payload, "s", TokenKind::Refresh)
        .unwrap();

    let (status, _, body) =
        send(&router, bearer_request("GET", "/authentication/me", &access)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "DATABASE_ERROR");

    let (status, _, body) = send(
        &router,
        create_json_request(
            "POST",
            "/authentication/sign-in",
            Some(json!({ "email": "down@example.com", "password": "Pass123!" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "DATABASE_ERROR");

    let (status, body) = refresh_with_body(&router, &refresh).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "DATABASE_ERROR");
    assert!(!body.to_string().contains("connection refused"));

    let (status, _, body) = send(
        &router,
        Request::builder().uri("/ready").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["ready"], false);
}

// =============================================================================
// Cookies
// =============================================================================

#[tokio::test]
async fn test_token_cookies_set_on_sign_in() {
    let TestApp { router, .. } = test_app();
    sign_up(&router, "cookies@example.com").await;

    let (status, headers, body) = send(
        &router,
        create_json_request(
            "POST",
            "/authentication/sign-in",
            Some(json!({ "email": "cookies@example.com", "password": "Pass123!" })),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get(header::CACHE_CONTROL).unwrap(), "no-store");

    let cookies = set_cookies(&headers);
    let access = body["accessToken"].as_str().unwrap();
    assert!(cookies
        .iter()
        .any(|c| c.starts_with(&format!("accessToken={access};")) && c.contains("HttpOnly")));
    assert!(cookies
        .iter()
        .any(|c| c.starts_with("refreshToken=") && c.contains("SameSite=Strict")));
}

// =============================================================================
// Property tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    #[test]
    fn prop_sign_up_then_sign_in(
        local in "[a-z]{1,12}",
        letters in "[a-zA-Z]{4,10}",
        digit in 0u8..10,
    ) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let TestApp { router, .. } = test_app();
            let email = format!("{local}@example.com");
            let password = format!("{letters}{digit}!");

            let (status, _, _) = send(
                &router,
                create_json_request(
                    "POST",
                    "/authentication/sign-up",
                    Some(json!({ "email": email, "name": local, "password": password })),
                ),
            )
            .await;
            assert_eq!(status, StatusCode::OK);

            let (status, _, body) = send(
                &router,
                create_json_request(
                    "POST",
                    "/authentication/sign-in",
                    Some(json!({ "email": email.to_uppercase(), "password": password })),
                ),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
            let access = body["accessToken"].as_str().unwrap();

            let (status, _, me) =
                send(&router, bearer_request("GET", "/authentication/me", access)).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(me["email"], email);
            assert_eq!(me["name"], local);
        });
    }
}
