//! Test utilities and common setup.
#![allow(dead_code)]

use axum::{
    Router,
    body::Body,
    http::{Method, Request, Response, StatusCode, header},
};
use chrono::Duration;
use esg_auth::api::{self, AppState, HttpSettings};
use esg_auth::auth::{AccessPolicy, CredentialVerifier, TokenCodec};
use esg_auth::db::Database;
use esg_auth::member::{MemberRepository, MemberService};
use esg_auth::storage::LocalImageStorage;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

pub const TEST_SECRET: &[u8] = b"test-secret-for-integration-tests-minimum-32-chars";
pub const IMAGE_PREFIX: &str = "/images";
pub const MAX_UPLOAD_BYTES: usize = 64 * 1024;
pub const ALLOWED_ORIGIN: &str = "http://localhost:3000";

/// A running router plus the pieces tests need to poke at directly.
pub struct TestApp {
    pub router: Router,
    pub codec: TokenCodec,
    pub uploads: TempDir,
}

impl TestApp {
    /// Send a request through a clone of the router.
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Register a member with the given email and password.
    pub async fn register(&self, email: &str, password: &str) -> Response<Body> {
        self.send(json_request(
            Method::POST,
            "/auth/register",
            None,
            json!({
                "name": "Test Member",
                "email": email,
                "password": password,
                "phoneNumber": "010-1234-5678",
                "companyName": "Green Corp",
                "position": "ESG Analyst"
            }),
        ))
        .await
    }

    /// Log in and return the status with the parsed body.
    pub async fn login(&self, email: &str, password: &str) -> (StatusCode, Value) {
        let response = self
            .send(json_request(
                Method::POST,
                "/auth/login",
                None,
                json!({ "email": email, "password": password }),
            ))
            .await;
        let status = response.status();
        (status, body_json(response).await)
    }

    /// Register then log in, returning the issued token.
    pub async fn member_token(&self, email: &str, password: &str) -> String {
        let response = self.register(email, password).await;
        assert_eq!(response.status(), StatusCode::CREATED);

        let (status, body) = self.login(email, password).await;
        assert_eq!(status, StatusCode::OK);
        body["token"].as_str().unwrap().to_string()
    }
}

/// Create a test application with all services initialized.
pub async fn test_app() -> TestApp {
    build_app(None).await
}

/// Test application that also serves `handle` at `/metrics`.
pub async fn test_app_with_metrics(handle: PrometheusHandle) -> TestApp {
    build_app(Some(handle)).await
}

async fn build_app(metrics: Option<PrometheusHandle>) -> TestApp {
    // Use in-memory database for tests
    let db = Database::in_memory().await.unwrap();
    let uploads = TempDir::new().unwrap();

    let codec = TokenCodec::with_secret(TEST_SECRET, Duration::hours(1)).unwrap();
    let blobs = Arc::new(LocalImageStorage::new(uploads.path(), IMAGE_PREFIX));

    let members = MemberService::new(
        Arc::new(MemberRepository::new(db.pool().clone())),
        CredentialVerifier::bcrypt(4),
        codec.clone(),
        blobs,
    );

    let mut policy = AccessPolicy::member_service(IMAGE_PREFIX);
    if metrics.is_some() {
        policy = policy.public(Some(Method::GET), "/metrics");
    }

    let mut state = AppState::new(
        members,
        codec.clone(),
        policy,
        HttpSettings {
            allowed_origins: vec![ALLOWED_ORIGIN.to_string()],
            upload_dir: uploads.path().to_path_buf(),
            public_prefix: IMAGE_PREFIX.to_string(),
            max_upload_bytes: MAX_UPLOAD_BYTES,
        },
    );

    if let Some(handle) = metrics {
        state = state.with_metrics(handle);
    }

    TestApp {
        router: api::create_router(state),
        codec,
        uploads,
    }
}

/// Build a JSON request, optionally with a bearer token.
pub fn json_request(method: Method, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .uri(uri)
        .method(method)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

/// Build a body-less request, optionally with a bearer token.
pub fn empty_request(method: Method, uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri).method(method);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

pub const BOUNDARY: &str = "esg-test-boundary";

/// Build a multipart upload with a single file part.
pub fn multipart_request(
    uri: &str,
    token: Option<&str>,
    field: &str,
    filename: &str,
    data: &[u8],
) -> Request<Body> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    let mut builder = Request::builder()
        .uri(uri)
        .method(Method::PUT)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        );
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body)).unwrap()
}

/// Read a response body as JSON.
pub async fn body_json(response: Response<Body>) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}
