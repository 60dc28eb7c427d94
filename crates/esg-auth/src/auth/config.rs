//! Authentication configuration.

use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Placeholder secret shipped in old sample configs. Never accepted.
const INSECURE_PLACEHOLDER_SECRET: &str = "change-me-in-production";

/// Minimum secret length accepted for HS256 signing.
const MIN_SECRET_LENGTH: usize = 32;

/// Longest accepted token lifetime (ten years).
pub const MAX_TOKEN_LIFETIME_HOURS: i64 = 24 * 365 * 10;

/// Authentication configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HS256 signing secret. Supports `env:VAR_NAME` indirection.
    /// REQUIRED.
    pub jwt_secret: Option<String>,

    /// Token lifetime in hours.
    pub token_lifetime_hours: i64,

    /// bcrypt work factor used when hashing new passwords.
    pub bcrypt_cost: u32,

    /// Allowed CORS origins. If empty, CORS is disabled.
    pub allowed_origins: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            // No default JWT secret - must be explicitly configured
            jwt_secret: None,
            token_lifetime_hours: 1,
            bcrypt_cost: 10,
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:8080".to_string(),
            ],
        }
    }
}

impl AuthConfig {
    /// Resolve the JWT secret, expanding `env:VAR_NAME` syntax.
    /// Returns the resolved secret or None if not configured.
    pub fn resolve_jwt_secret(&self) -> Result<Option<String>, ConfigValidationError> {
        match &self.jwt_secret {
            None => Ok(None),
            Some(value) => {
                if let Some(var_name) = value.strip_prefix("env:") {
                    match std::env::var(var_name) {
                        Ok(secret) if !secret.is_empty() => Ok(Some(secret)),
                        Ok(_) => Err(ConfigValidationError::EnvVarEmpty(var_name.to_string())),
                        Err(_) => Err(ConfigValidationError::EnvVarNotFound(var_name.to_string())),
                    }
                } else {
                    Ok(Some(value.clone()))
                }
            }
        }
    }

    /// Resolve and check the secret, returning it ready for key construction.
    pub fn require_jwt_secret(&self) -> Result<String, ConfigValidationError> {
        let secret = self
            .resolve_jwt_secret()?
            .ok_or(ConfigValidationError::MissingJwtSecret)?;

        if secret == INSECURE_PLACEHOLDER_SECRET {
            return Err(ConfigValidationError::InsecureJwtSecret);
        }
        if secret.len() < MIN_SECRET_LENGTH {
            return Err(ConfigValidationError::JwtSecretTooShort);
        }

        Ok(secret)
    }

    /// Token lifetime as a duration, checked against the accepted range.
    pub fn token_lifetime(&self) -> Result<Duration, ConfigValidationError> {
        let hours = self.token_lifetime_hours;
        if hours <= 0 {
            return Err(ConfigValidationError::NonPositiveLifetime(hours));
        }
        if hours > MAX_TOKEN_LIFETIME_HOURS {
            return Err(ConfigValidationError::LifetimeTooLong(hours));
        }
        Duration::try_hours(hours).ok_or(ConfigValidationError::LifetimeTooLong(hours))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        self.require_jwt_secret()?;

        self.token_lifetime()?;

        if !(4..=31).contains(&self.bcrypt_cost) {
            return Err(ConfigValidationError::InvalidBcryptCost(self.bcrypt_cost));
        }

        Ok(())
    }

    /// Generate a secure random JWT secret using cryptographically secure RNG.
    pub fn generate_jwt_secret() -> String {
        use rand::Rng;

        const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
        const SECRET_LENGTH: usize = 64;

        let mut rng = rand::rng();
        (0..SECRET_LENGTH)
            .map(|_| {
                let idx = rng.random_range(0..CHARSET.len());
                CHARSET[idx] as char
            })
            .collect()
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValidationError {
    /// JWT secret is required.
    MissingJwtSecret,
    /// JWT secret is the insecure placeholder value.
    InsecureJwtSecret,
    /// JWT secret is too short (minimum 32 characters).
    JwtSecretTooShort,
    /// Token lifetime must be positive.
    NonPositiveLifetime(i64),
    /// Token lifetime exceeds `MAX_TOKEN_LIFETIME_HOURS`.
    LifetimeTooLong(i64),
    /// Token lifetime (in seconds) outside the range a codec accepts.
    LifetimeOutOfRange(i64),
    /// bcrypt cost outside the range bcrypt accepts.
    InvalidBcryptCost(u32),
    /// Environment variable not found (for `env:VAR_NAME` syntax).
    EnvVarNotFound(String),
    /// Environment variable is empty (for `env:VAR_NAME` syntax).
    EnvVarEmpty(String),
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingJwtSecret => {
                write!(
                    f,
                    "JWT secret is required. Set ESG_AUTH__AUTH__JWT_SECRET or jwt_secret in config."
                )
            }
            Self::InsecureJwtSecret => {
                write!(
                    f,
                    "JWT secret cannot be the sample placeholder. Please configure a secure secret."
                )
            }
            Self::JwtSecretTooShort => {
                write!(
                    f,
                    "JWT secret must be at least {} characters long.",
                    MIN_SECRET_LENGTH
                )
            }
            Self::NonPositiveLifetime(hours) => {
                write!(f, "token_lifetime_hours must be positive (got {}).", hours)
            }
            Self::LifetimeTooLong(hours) => {
                write!(
                    f,
                    "token_lifetime_hours must be at most {} (got {}).",
                    MAX_TOKEN_LIFETIME_HOURS, hours
                )
            }
            Self::LifetimeOutOfRange(seconds) => {
                write!(
                    f,
                    "token lifetime must be positive and at most {} hours (got {} seconds).",
                    MAX_TOKEN_LIFETIME_HOURS, seconds
                )
            }
            Self::InvalidBcryptCost(cost) => {
                write!(f, "bcrypt_cost must be between 4 and 31 (got {}).", cost)
            }
            Self::EnvVarNotFound(var) => {
                write!(
                    f,
                    "Environment variable '{}' not found (referenced via env:{} in config).",
                    var, var
                )
            }
            Self::EnvVarEmpty(var) => {
                write!(
                    f,
                    "Environment variable '{}' is empty (referenced via env:{} in config).",
                    var, var
                )
            }
        }
    }
}

impl std::error::Error for ConfigValidationError {}
