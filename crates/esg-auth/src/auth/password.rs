//! Password hashing and verification.

use std::sync::Arc;

use tracing::warn;

use super::error::AuthError;

/// Longest secret bcrypt can hash without truncation, in bytes.
pub const MAX_SECRET_BYTES: usize = 72;

/// One-way hashing oracle for member secrets.
pub trait PasswordHasher: Send + Sync {
    /// Produce a salted hash of `secret`.
    fn hash(&self, secret: &str) -> Result<String, AuthError>;

    /// Check `secret` against a stored hash.
    fn verify(&self, secret: &str, hash: &str) -> Result<bool, AuthError>;
}

/// bcrypt-backed hasher.
#[derive(Debug, Clone, Copy)]
pub struct BcryptHasher {
    cost: u32,
}

impl BcryptHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }
}

impl Default for BcryptHasher {
    fn default() -> Self {
        Self::new(bcrypt::DEFAULT_COST)
    }
}

impl PasswordHasher for BcryptHasher {
    fn hash(&self, secret: &str) -> Result<String, AuthError> {
        bcrypt::non_truncating_hash(secret, self.cost)
            .map_err(|e| AuthError::Internal(format!("failed to hash password: {}", e)))
    }

    fn verify(&self, secret: &str, hash: &str) -> Result<bool, AuthError> {
        // No stored hash can come from a longer secret.
        if secret.len() > MAX_SECRET_BYTES {
            return Ok(false);
        }
        bcrypt::non_truncating_verify(secret, hash)
            .map_err(|e| AuthError::Internal(format!("failed to verify password: {}", e)))
    }
}

/// Compares presented secrets against stored hashes.
#[derive(Clone)]
pub struct CredentialVerifier {
    hasher: Arc<dyn PasswordHasher>,
}

impl std::fmt::Debug for CredentialVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialVerifier").finish_non_exhaustive()
    }
}

impl CredentialVerifier {
    pub fn new(hasher: Arc<dyn PasswordHasher>) -> Self {
        Self { hasher }
    }

    /// Verifier backed by bcrypt at the given cost.
    pub fn bcrypt(cost: u32) -> Self {
        Self::new(Arc::new(BcryptHasher::new(cost)))
    }

    /// Hash a new secret for storage.
    pub fn hash(&self, secret: &str) -> Result<String, AuthError> {
        self.hasher.hash(secret)
    }

    /// Whether `secret` matches `hash`. A malformed stored hash never matches.
    pub fn matches(&self, secret: &str, hash: &str) -> bool {
        match self.hasher.verify(secret, hash) {
            Ok(matched) => matched,
            Err(e) => {
                warn!(error = %e, "stored password hash could not be checked");
                false
            }
        }
    }
}
