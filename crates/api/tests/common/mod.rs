//! Shared integration test harness.
//!
//! Builds the full application router (same middleware stack as
//! production) and provides request helpers around
//! `tower::ServiceExt::oneshot` so tests never need a TCP listener.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use sqlx::PgPool;
use tower::ServiceExt;

use piecework_api::auth::jwt::{generate_access_token, JwtConfig};
use piecework_api::config::{ServerConfig, SiteConfig};
use piecework_api::router::build_app_router;
use piecework_api::state::AppState;
use piecework_core::types::DbId;

const TEST_JWT_SECRET: &str = "test-secret-that-is-long-enough-for-hmac";

/// Build a test `ServerConfig` with safe defaults and a fixed JWT secret.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        jwt: JwtConfig {
            secret: TEST_JWT_SECRET.to_string(),
            access_token_expiry_mins: 60,
        },
        site: SiteConfig::default(),
    }
}

/// Build the full application router with all middleware layers, using
/// the given database pool.
pub fn build_test_app(pool: PgPool) -> Router {
    let config = test_config();
    let state = AppState {
        pool,
        config: Arc::new(config.clone()),
    };
    build_app_router(state, &config)
}

/// Mint a Bearer token for the given user id.
pub fn token_for(user_id: DbId, admin: bool) -> String {
    let config = test_config();
    generate_access_token(user_id, admin, &config.jwt).expect("token generation")
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    request(app, Method::GET, uri, None, Body::empty(), None).await
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    request(app, Method::GET, uri, None, Body::empty(), Some(token)).await
}

pub async fn post_json(app: Router, uri: &str, json: serde_json::Value) -> Response<Body> {
    request(
        app,
        Method::POST,
        uri,
        Some("application/json"),
        Body::from(json.to_string()),
        None,
    )
    .await
}

pub async fn post_json_auth(
    app: Router,
    uri: &str,
    json: serde_json::Value,
    token: &str,
) -> Response<Body> {
    request(
        app,
        Method::POST,
        uri,
        Some("application/json"),
        Body::from(json.to_string()),
        Some(token),
    )
    .await
}

pub async fn put_json_auth(
    app: Router,
    uri: &str,
    json: serde_json::Value,
    token: &str,
) -> Response<Body> {
    request(
        app,
        Method::PUT,
        uri,
        Some("application/json"),
        Body::from(json.to_string()),
        Some(token),
    )
    .await
}

pub async fn delete_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    request(app, Method::DELETE, uri, None, Body::empty(), Some(token)).await
}

async fn request(
    app: Router,
    method: Method,
    uri: &str,
    content_type: Option<&str>,
    body: Body,
    token: Option<&str>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(ct) = content_type {
        builder = builder.header("content-type", ct);
    }
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let request = builder.body(body).expect("request build");
    app.oneshot(request).await.expect("request dispatch")
}

/// Collect a response body as parsed JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body collect")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body is valid JSON")
}

/// Collect a response body as raw bytes.
pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .expect("body collect")
        .to_bytes()
        .to_vec()
}

// ---------------------------------------------------------------------------
// Multipart upload helper
// ---------------------------------------------------------------------------

const BOUNDARY: &str = "------------piecework-test-boundary";

/// Build and send a multipart CSV upload with optional extra text fields.
pub async fn post_csv_upload(
    app: Router,
    uri: &str,
    filename: &str,
    csv: &str,
    fields: &[(&str, &str)],
    token: &str,
) -> Response<Body> {
    let mut body = String::new();
    for (name, value) in fields {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
        ));
    }
    body.push_str(&format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"csv_file\"; \
         filename=\"{filename}\"\r\nContent-Type: text/csv\r\n\r\n{csv}\r\n--{BOUNDARY}--\r\n"
    ));

    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .header("authorization", format!("Bearer {token}"))
        .body(Body::from(body))
        .expect("request build");
    app.oneshot(request).await.expect("request dispatch")
}

/// Assert a status code, dumping the body on mismatch for debugging.
pub async fn assert_status(response: Response<Body>, expected: StatusCode) -> serde_json::Value {
    let status = response.status();
    let json = body_json(response).await;
    assert_eq!(status, expected, "unexpected status, body: {json}");
    json
}
