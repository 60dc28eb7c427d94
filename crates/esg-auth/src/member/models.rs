//! Member data models.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::auth::MemberId;

/// Member entity from database.
#[derive(Debug, Clone, FromRow)]
pub struct Member {
    pub id: MemberId,
    pub name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub company_name: Option<String>,
    pub position: Option<String>,
    pub password_hash: String,
    pub profile_image_url: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Fields for a member that has not been persisted yet.
#[derive(Debug, Clone)]
pub struct NewMember {
    pub name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub company_name: Option<String>,
    pub position: Option<String>,
    pub password_hash: String,
}

/// Public member info (safe to return to clients).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberProfile {
    pub member_id: MemberId,
    pub name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub company_name: Option<String>,
    pub position: Option<String>,
    pub profile_image_url: Option<String>,
}

impl From<Member> for MemberProfile {
    fn from(member: Member) -> Self {
        Self {
            member_id: member.id,
            name: member.name,
            email: member.email,
            phone_number: member.phone_number,
            company_name: member.company_name,
            position: member.position,
            profile_image_url: member.profile_image_url,
        }
    }
}

/// Request to register a new member.
///
/// Required fields default to empty so that missing and blank values get the
/// same validation error.
#[derive(Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub company_name: Option<String>,
    pub position: Option<String>,
    pub password: String,
}

impl std::fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("phone_number", &self.phone_number)
            .field("company_name", &self.company_name)
            .field("position", &self.position)
            .finish_non_exhaustive()
    }
}

/// Login request.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

/// Login response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    pub token: String,
}

/// Password change request.
#[derive(Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

impl std::fmt::Debug for ChangePasswordRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangePasswordRequest").finish_non_exhaustive()
    }
}

/// Profile image reference response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileImageResponse {
    pub profile_image_url: Option<String>,
}
