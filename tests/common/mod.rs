//! Shared helpers: an app wired to the in-memory store and small request builders.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use timetrac::config::{Config, PasswordHashConfig, SigningSecret};
use timetrac::store::memory::MemoryStore;
use timetrac::AppState;

pub const ORIGIN: &str = "http://localhost:8100";

pub fn test_config() -> Config {
    Config {
        port: 0,
        database_url: "memory://".into(),
        cors_origin: ORIGIN.into(),
        jwt_secret: SigningSecret::new("integration-test-secret-0123456789"),
        token_ttl: Duration::from_secs(24 * 60 * 60),
        // cheapest valid argon2 cost keeps the suite fast
        password_hash: PasswordHashConfig {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        },
    }
}

pub fn test_state() -> Arc<AppState> {
    Arc::new(AppState::new(test_config(), Arc::new(MemoryStore::new())).unwrap())
}

pub fn test_app() -> Router {
    timetrac::api::router(test_state()).unwrap()
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: axum::http::HeaderMap,
    pub body: Value,
}

pub async fn send(app: &Router, req: Request<Body>) -> TestResponse {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    TestResponse {
        status,
        headers,
        body,
    }
}

pub fn json_request(method: Method, uri: &str, body: Value, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn empty_request(method: Method, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

pub async fn register(app: &Router, email: &str, password: &str) -> TestResponse {
    send(
        app,
        json_request(
            Method::POST,
            "/auth/register",
            serde_json::json!({ "email": email, "password": password }),
            None,
        ),
    )
    .await
}

pub async fn login(app: &Router, email: &str, password: &str) -> TestResponse {
    send(
        app,
        json_request(
            Method::POST,
            "/auth/login",
            serde_json::json!({ "email": email, "password": password }),
            None,
        ),
    )
    .await
}

/// Register + login, returning the bearer token.
pub async fn signed_in(app: &Router, email: &str) -> String {
    assert_eq!(register(app, email, "secret1").await.status, StatusCode::CREATED);
    let resp = login(app, email, "secret1").await;
    assert_eq!(resp.status, StatusCode::OK);
    resp.body["token"].as_str().unwrap().to_string()
}
