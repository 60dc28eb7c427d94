//! Member accounts: models, persistence and the account service.

mod error;
mod models;
mod repository;
mod service;

pub use error::{MemberError, StoreError};
pub use models::{
    ChangePasswordRequest, LoginRequest, LoginResponse, Member, MemberProfile, NewMember,
    ProfileImageResponse, RegisterRequest,
};
pub use repository::{MemberRepository, MemberStore};
pub use service::{MIN_PASSWORD_LENGTH, MemberService, is_valid_email, meets_password_length};
