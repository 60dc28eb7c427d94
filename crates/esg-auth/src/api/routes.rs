//! API route definitions.

use axum::http::{HeaderValue, Method, header};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post, put},
};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::auth::{auth_middleware, enforce_access};

use super::handlers;
use super::state::AppState;

/// Content-Security-Policy sent with every response.
pub const CONTENT_SECURITY_POLICY: &str =
    "default-src 'self'; script-src 'self'; object-src 'none';";

/// Create the application router.
///
/// Request order: trace, CSP header, CORS, authentication (binds the member),
/// access policy (rejects unauthenticated calls to protected routes), handler.
pub fn create_router(state: AppState) -> Router {
    let cors = build_cors_layer(&state.http.allowed_origins);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    let csp = SetResponseHeaderLayer::overriding(
        header::CONTENT_SECURITY_POLICY,
        HeaderValue::from_static(CONTENT_SECURITY_POLICY),
    );

    let images = ServeDir::new(&state.http.upload_dir);

    let mut router: Router<AppState> = Router::new();
    if state.metrics.is_some() {
        router = router.route("/metrics", get(handlers::metrics));
    }

    router
        .route("/health", get(handlers::health))
        .route("/auth/register", post(handlers::register))
        .route("/auth/login", post(handlers::login))
        .route("/auth/me", get(handlers::me))
        .route("/auth/password", put(handlers::change_password))
        .route(
            "/auth/profile-image",
            put(handlers::upload_profile_image).get(handlers::get_profile_image),
        )
        .nest_service(&state.http.public_prefix, images)
        .layer(DefaultBodyLimit::max(state.http.max_upload_bytes))
        .layer(middleware::from_fn_with_state(
            state.policy.clone(),
            enforce_access,
        ))
        .layer(middleware::from_fn_with_state(
            state.codec.clone(),
            auth_middleware,
        ))
        .layer(cors)
        .layer(csp)
        .layer(trace_layer)
        .with_state(state)
}

/// Build the CORS layer from the configured origins.
///
/// With no usable origins configured, all cross-origin requests are denied.
fn build_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let methods = [Method::GET, Method::POST, Method::PUT, Method::OPTIONS];

    let headers = [
        header::AUTHORIZATION,
        header::CONTENT_TYPE,
        header::ACCEPT,
        header::ORIGIN,
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| {
            origin.parse::<HeaderValue>().ok().or_else(|| {
                tracing::warn!("CORS: Invalid origin in config: {}", origin);
                None
            })
        })
        .collect();

    if origins.is_empty() {
        tracing::warn!("CORS: No valid origins configured, denying all cross-origin requests");
        CorsLayer::new().allow_origin(AllowOrigin::exact(HeaderValue::from_static("null")))
    } else {
        tracing::info!("CORS: Allowing {} origin(s)", origins.len());
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(headers)
            .allow_credentials(true)
    }
}
