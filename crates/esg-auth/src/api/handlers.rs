//! API request handlers.

use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartRejection, rejection::JsonRejection},
    http::StatusCode,
};
use serde::Serialize;
use tracing::{debug, instrument};

use crate::auth::CurrentMember;
use crate::member::{
    ChangePasswordRequest, LoginRequest, LoginResponse, MemberProfile, ProfileImageResponse,
    RegisterRequest,
};

use super::error::ApiError;
use super::state::AppState;

/// Result type for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

/// Multipart field carrying the profile image.
const IMAGE_FIELD: &str = "file";

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Plain confirmation message.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Prometheus text exposition of the account counters.
pub async fn metrics(State(state): State<AppState>) -> String {
    state
        .metrics
        .as_ref()
        .map(|handle| handle.render())
        .unwrap_or_default()
}

/// Register a new member.
#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<MemberProfile>)> {
    let Json(request) = payload?;
    let profile = state.members.register(request).await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

/// Log in and receive a token.
#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<Json<LoginResponse>> {
    let Json(request) = payload?;
    let token = state.members.login(request).await?;
    Ok(Json(LoginResponse { token }))
}

/// Profile of the calling member.
#[instrument(skip(state), fields(member_id = %member.id))]
pub async fn me(
    State(state): State<AppState>,
    member: CurrentMember,
) -> ApiResult<Json<MemberProfile>> {
    let profile = state.members.get_profile(member.id).await?;
    Ok(Json(profile))
}

/// Change the calling member's password.
#[instrument(skip(state, payload), fields(member_id = %member.id))]
pub async fn change_password(
    State(state): State<AppState>,
    member: CurrentMember,
    payload: Result<Json<ChangePasswordRequest>, JsonRejection>,
) -> ApiResult<Json<MessageResponse>> {
    let Json(request) = payload?;
    state.members.change_password(member.id, request).await?;
    Ok(Json(MessageResponse {
        message: "password changed".to_string(),
    }))
}

/// Upload a new profile image (multipart field `file`).
#[instrument(skip(state, multipart), fields(member_id = %member.id))]
pub async fn upload_profile_image(
    State(state): State<AppState>,
    member: CurrentMember,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Json<ProfileImageResponse>> {
    let mut multipart = multipart?;

    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(IMAGE_FIELD) {
            debug!(name = ?field.name(), "skipping multipart field");
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        let data = field.bytes().await?;

        let reference = state
            .members
            .update_profile_image(member.id, &data, &filename)
            .await?;

        return Ok(Json(ProfileImageResponse {
            profile_image_url: Some(reference),
        }));
    }

    Err(ApiError::invalid_field(IMAGE_FIELD, "file is required"))
}

/// Current profile image reference of the calling member.
#[instrument(skip(state), fields(member_id = %member.id))]
pub async fn get_profile_image(
    State(state): State<AppState>,
    member: CurrentMember,
) -> ApiResult<Json<ProfileImageResponse>> {
    let profile_image_url = state.members.get_profile_image(member.id).await?;
    Ok(Json(ProfileImageResponse { profile_image_url }))
}
