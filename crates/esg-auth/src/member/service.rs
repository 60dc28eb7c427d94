//! Member service for account business logic.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, error, info, instrument, warn};

use super::error::{MemberError, StoreError};
use super::models::{
    ChangePasswordRequest, LoginRequest, Member, MemberProfile, NewMember, RegisterRequest,
};
use super::repository::MemberStore;
use crate::auth::{CredentialVerifier, MAX_SECRET_BYTES, MemberId, TokenCodec};
use crate::metrics::{self, Outcome};
use crate::storage::BlobStore;

/// Minimum password length, counted in characters.
pub const MIN_PASSWORD_LENGTH: usize = 8;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9+_.-]+@(.+)$").expect("Invalid regex pattern for email")
});

type Result<T> = std::result::Result<T, MemberError>;

/// Service for member account operations.
///
/// Every public operation logs its failure inside its own span, so the
/// email or member id is attached to the event. Register and login outcomes
/// are also counted (see [`crate::metrics`]).
#[derive(Clone)]
pub struct MemberService {
    store: Arc<dyn MemberStore>,
    verifier: CredentialVerifier,
    codec: TokenCodec,
    blobs: Arc<dyn BlobStore>,
}

impl MemberService {
    /// Create a new member service.
    pub fn new(
        store: Arc<dyn MemberStore>,
        verifier: CredentialVerifier,
        codec: TokenCodec,
        blobs: Arc<dyn BlobStore>,
    ) -> Self {
        Self {
            store,
            verifier,
            codec,
            blobs,
        }
    }

    /// Register a new member.
    ///
    /// Checks run in a fixed order and the first failure is reported: email,
    /// password and name present, email syntax, password length, password
    /// size, then email uniqueness.
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn register(&self, request: RegisterRequest) -> Result<MemberProfile> {
        info!("registration attempt");
        match self.create_member(request).await {
            Ok(profile) => {
                metrics::record_register(Outcome::Success);
                info!(member_id = %profile.member_id, "registered new member");
                Ok(profile)
            }
            Err(e) => {
                metrics::record_register(Outcome::Failure);
                log_failure("registration failed", &e);
                Err(e)
            }
        }
    }

    async fn create_member(&self, request: RegisterRequest) -> Result<MemberProfile> {
        if is_blank(&request.email) {
            return Err(MemberError::invalid_input("email", "email is required"));
        }
        if is_blank(&request.password) {
            return Err(MemberError::invalid_input("password", "password is required"));
        }
        if is_blank(&request.name) {
            return Err(MemberError::invalid_input("name", "name is required"));
        }
        if !is_valid_email(&request.email) {
            return Err(MemberError::invalid_input("email", "invalid email format"));
        }
        check_new_password("password", &request.password)?;
        if self.store.find_by_email(&request.email).await?.is_some() {
            return Err(MemberError::DuplicateAccount(request.email));
        }

        let password_hash = self.verifier.hash(&request.password)?;
        let email = request.email.clone();
        let member = self
            .store
            .create(NewMember {
                name: request.name,
                email: request.email,
                phone_number: request.phone_number,
                company_name: request.company_name,
                position: request.position,
                password_hash,
            })
            .await
            .map_err(|e| match e {
                StoreError::DuplicateEmail => MemberError::DuplicateAccount(email),
                other => other.into(),
            })?;

        Ok(member.into())
    }

    /// Check credentials and issue a token for the member.
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn login(&self, request: LoginRequest) -> Result<String> {
        info!("login attempt");
        match self.authenticate(request).await {
            Ok((member_id, token)) => {
                metrics::record_login(Outcome::Success);
                info!(member_id = %member_id, "login succeeded");
                Ok(token)
            }
            Err(e) => {
                metrics::record_login(Outcome::Failure);
                log_failure("login failed", &e);
                Err(e)
            }
        }
    }

    async fn authenticate(&self, request: LoginRequest) -> Result<(MemberId, String)> {
        if is_blank(&request.email) {
            return Err(MemberError::invalid_input("email", "email is required"));
        }
        if is_blank(&request.password) {
            return Err(MemberError::invalid_input("password", "password is required"));
        }

        let member = self
            .store
            .find_by_email(&request.email)
            .await?
            .ok_or(MemberError::AccountNotFound)?;

        if !self.verifier.matches(&request.password, &member.password_hash) {
            return Err(MemberError::InvalidCredentials(
                "password does not match".to_string(),
            ));
        }

        let token = self.codec.issue(member.id)?;
        Ok((member.id, token))
    }

    /// Profile of the given member.
    #[instrument(skip(self))]
    pub async fn get_profile(&self, member_id: MemberId) -> Result<MemberProfile> {
        debug!("loading profile");
        let member = self
            .load(member_id)
            .await
            .inspect_err(|e| log_failure("profile lookup failed", e))?;
        Ok(member.into())
    }

    /// Replace the member's password after checking the current one.
    #[instrument(skip(self, request))]
    pub async fn change_password(
        &self,
        member_id: MemberId,
        request: ChangePasswordRequest,
    ) -> Result<()> {
        info!("password change attempt");
        self.replace_password(member_id, request)
            .await
            .inspect_err(|e| log_failure("password change failed", e))?;
        info!("password changed");
        Ok(())
    }

    async fn replace_password(
        &self,
        member_id: MemberId,
        request: ChangePasswordRequest,
    ) -> Result<()> {
        let mut member = self.load(member_id).await?;

        if !self
            .verifier
            .matches(&request.current_password, &member.password_hash)
        {
            return Err(MemberError::InvalidCredentials(
                "current password does not match".to_string(),
            ));
        }
        check_new_password("newPassword", &request.new_password)?;
        if request.new_password != request.confirm_password {
            return Err(MemberError::invalid_input(
                "confirmPassword",
                "password confirmation does not match",
            ));
        }

        member.password_hash = self.verifier.hash(&request.new_password)?;
        self.store.save(&member).await?;
        Ok(())
    }

    /// Store a new profile image and point the member at it.
    ///
    /// Returns the public reference of the stored image.
    #[instrument(skip(self, data), fields(size = data.len()))]
    pub async fn update_profile_image(
        &self,
        member_id: MemberId,
        data: &[u8],
        filename: &str,
    ) -> Result<String> {
        info!("profile image update attempt");
        let reference = self
            .replace_profile_image(member_id, data, filename)
            .await
            .inspect_err(|e| log_failure("profile image update failed", e))?;
        info!(image = %reference, "profile image updated");
        Ok(reference)
    }

    async fn replace_profile_image(
        &self,
        member_id: MemberId,
        data: &[u8],
        filename: &str,
    ) -> Result<String> {
        if data.is_empty() {
            return Err(MemberError::invalid_input("file", "uploaded file is empty"));
        }

        let mut member = self.load(member_id).await?;
        let reference = self.blobs.store(data, filename).await?;

        member.profile_image_url = Some(reference.clone());
        self.store.save(&member).await?;
        Ok(reference)
    }

    /// Reference of the member's current profile image, if any.
    #[instrument(skip(self))]
    pub async fn get_profile_image(&self, member_id: MemberId) -> Result<Option<String>> {
        debug!("loading profile image reference");
        let member = self
            .load(member_id)
            .await
            .inspect_err(|e| log_failure("profile image lookup failed", e))?;

        if let Some(reference) = &member.profile_image_url {
            match self.blobs.exists(reference).await {
                Ok(true) => {}
                Ok(false) => warn!(image = %reference, "profile image reference has no stored file"),
                Err(e) => warn!(image = %reference, error = %e, "could not check profile image"),
            }
        }

        Ok(member.profile_image_url)
    }

    async fn load(&self, member_id: MemberId) -> Result<Member> {
        self.store
            .find_by_id(member_id)
            .await?
            .ok_or(MemberError::AccountNotFound)
    }
}

/// Log a failed operation in the caller's span.
///
/// Server-side failures go out at error level, rejected requests at warn.
fn log_failure(action: &str, err: &MemberError) {
    match err {
        MemberError::Store(_) | MemberError::Internal(_) | MemberError::FileStorage(_) => {
            error!(error = %err, "{}", action);
        }
        MemberError::InvalidInput { field, .. } => {
            warn!(field = %field, error = %err, "{}", action);
        }
        _ => warn!(error = %err, "{}", action),
    }
}

/// Length checks shared by registration and password change.
fn check_new_password(field: &'static str, password: &str) -> Result<()> {
    if !meets_password_length(password) {
        return Err(MemberError::invalid_input(
            field,
            format!("password must be at least {} characters", MIN_PASSWORD_LENGTH),
        ));
    }
    if !fits_password_hasher(password) {
        return Err(MemberError::invalid_input(
            field,
            format!("password must be at most {} bytes", MAX_SECRET_BYTES),
        ));
    }
    Ok(())
}

/// Whether a required field is missing.
fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Email syntax check.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Whether a password meets the length requirement.
pub fn meets_password_length(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LENGTH
}

/// Whether a password is short enough to hash without truncation.
pub fn fits_password_hasher(password: &str) -> bool {
    password.len() <= MAX_SECRET_BYTES
}
