//! Token codec: issues and validates signed identity tokens.
//!
//! Tokens are HS256 JWTs carrying only `sub`, `iat` and `exp`. Validation
//! failures collapse into a single [`AuthError::InvalidToken`]; the precise
//! cause is only ever written to the debug log.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use tracing::debug;

use super::claims::{Claims, MemberId};
use super::config::{AuthConfig, ConfigValidationError, MAX_TOKEN_LIFETIME_HOURS};
use super::error::AuthError;

/// Why a token was rejected. Logged, never returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejection {
    Malformed,
    BadSignature,
    Expired,
    BadSubject,
}

struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    lifetime: Duration,
}

/// Issues and validates identity tokens.
///
/// Cheap to clone; the keys are shared and never mutated after construction.
#[derive(Clone)]
pub struct TokenCodec {
    keys: Arc<Keys>,
}

impl std::fmt::Debug for TokenCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenCodec")
            .field("lifetime", &self.keys.lifetime)
            .finish_non_exhaustive()
    }
}

impl TokenCodec {
    /// Build a codec from validated auth configuration.
    pub fn new(config: &AuthConfig) -> Result<Self, ConfigValidationError> {
        let secret = config.require_jwt_secret()?;
        Self::with_secret(secret.as_bytes(), config.token_lifetime()?)
    }

    /// Build a codec from a raw secret and lifetime.
    pub fn with_secret(secret: &[u8], lifetime: Duration) -> Result<Self, ConfigValidationError> {
        if lifetime <= Duration::zero() || lifetime > Duration::hours(MAX_TOKEN_LIFETIME_HOURS) {
            return Err(ConfigValidationError::LifetimeOutOfRange(
                lifetime.num_seconds(),
            ));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against our own clock in `validate_at`, with no leeway.
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["sub", "iat", "exp"]);

        Ok(Self {
            keys: Arc::new(Keys {
                encoding: EncodingKey::from_secret(secret),
                decoding: DecodingKey::from_secret(secret),
                validation,
                lifetime,
            }),
        })
    }

    /// Configured token lifetime.
    pub fn lifetime(&self) -> Duration {
        self.keys.lifetime
    }

    /// Issue a token for `member`, valid from now for the configured lifetime.
    pub fn issue(&self, member: MemberId) -> Result<String, AuthError> {
        self.issue_at(member, Utc::now())
    }

    /// Issue a token as if the current time were `now`.
    pub fn issue_at(&self, member: MemberId, now: DateTime<Utc>) -> Result<String, AuthError> {
        let expires = now
            .checked_add_signed(self.keys.lifetime)
            .ok_or_else(|| AuthError::Internal("token expiry out of range".to_string()))?;
        let claims = Claims::new(member, now.timestamp(), expires.timestamp());

        encode(&Header::new(Algorithm::HS256), &claims, &self.keys.encoding)
            .map_err(|e| AuthError::Internal(format!("failed to sign token: {}", e)))
    }

    /// Validate a token and return the member it asserts.
    pub fn validate(&self, token: &str) -> Result<MemberId, AuthError> {
        self.validate_at(token, Utc::now())
    }

    /// Validate a token as if the current time were `now`.
    pub fn validate_at(&self, token: &str, now: DateTime<Utc>) -> Result<MemberId, AuthError> {
        self.check(token, now.timestamp()).map_err(|cause| {
            debug!(?cause, "token rejected");
            AuthError::InvalidToken
        })
    }

    fn check(&self, token: &str, now: i64) -> Result<MemberId, Rejection> {
        let data = decode::<Claims>(token, &self.keys.decoding, &self.keys.validation).map_err(
            |e| match e.kind() {
                ErrorKind::InvalidSignature => Rejection::BadSignature,
                ErrorKind::ExpiredSignature => Rejection::Expired,
                _ => Rejection::Malformed,
            },
        )?;

        if !data.claims.is_live_at(now) {
            return Err(Rejection::Expired);
        }

        data.claims.member_id().ok_or(Rejection::BadSubject)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret-for-unit-tests-minimum-32-chars-long";

    fn codec() -> TokenCodec {
        TokenCodec::with_secret(SECRET, Duration::hours(1)).unwrap()
    }

    fn flip_last_signature_char(token: &str) -> String {
        let mut chars: Vec<char> = token.chars().collect();
        let last = chars.len() - 1;
        chars[last] = if chars[last] == 'A' { 'B' } else { 'A' };
        chars.into_iter().collect()
    }

    #[test]
    fn test_issue_then_validate_round_trips_identity() {
        let codec = codec();
        for id in [1_i64, 42, 9_000_000_000] {
            let token = codec.issue(MemberId(id)).unwrap();
            assert_eq!(codec.validate(&token).unwrap(), MemberId(id));
        }
    }

    #[test]
    fn test_token_has_three_segments_and_no_scheme() {
        let token = codec().issue(MemberId(5)).unwrap();
        assert_eq!(token.split('.').count(), 3);
        assert!(!token.starts_with("Bearer"));
    }

    #[test]
    fn test_valid_until_just_before_expiry() {
        let codec = codec();
        let issued = Utc::now();
        let token = codec.issue_at(MemberId(3), issued).unwrap();

        let almost = issued + Duration::hours(1) - Duration::seconds(1);
        assert_eq!(codec.validate_at(&token, almost).unwrap(), MemberId(3));
    }

    #[test]
    fn test_expired_token_rejected() {
        let codec = codec();
        let issued = Utc::now() - Duration::hours(2);
        let token = codec.issue_at(MemberId(3), issued).unwrap();

        assert_eq!(codec.validate(&token), Err(AuthError::InvalidToken));
    }

    #[test]
    fn test_token_rejected_exactly_at_expiry() {
        let codec = codec();
        let issued = Utc::now();
        let token = codec.issue_at(MemberId(3), issued).unwrap();

        let at_expiry = issued + Duration::hours(1);
        assert_eq!(
            codec.validate_at(&token, at_expiry),
            Err(AuthError::InvalidToken)
        );
    }

    #[test]
    fn test_flipped_signature_rejected() {
        let codec = codec();
        let token = codec.issue(MemberId(8)).unwrap();
        let tampered = flip_last_signature_char(&token);

        assert_ne!(token, tampered);
        assert_eq!(codec.validate(&tampered), Err(AuthError::InvalidToken));
    }

    #[test]
    fn test_foreign_key_rejected() {
        let other =
            TokenCodec::with_secret(b"another-secret-that-is-also-32-chars-long!", Duration::hours(1))
                .unwrap();
        let token = other.issue(MemberId(8)).unwrap();

        assert_eq!(codec().validate(&token), Err(AuthError::InvalidToken));
    }

    #[test]
    fn test_malformed_tokens_rejected() {
        let codec = codec();
        for garbage in ["", "abc", "a.b.c", "not-a-jwt-at-all", "..."] {
            assert_eq!(
                codec.validate(garbage),
                Err(AuthError::InvalidToken),
                "{garbage:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_unparseable_subject_rejected() {
        let codec = codec();
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: "alice@example.com".to_string(),
            iat: now,
            exp: now + 3600,
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET),
        )
        .unwrap();

        assert_eq!(codec.validate(&token), Err(AuthError::InvalidToken));
    }

    #[test]
    fn test_all_failures_share_one_error() {
        let codec = codec();
        let expired = codec
            .issue_at(MemberId(1), Utc::now() - Duration::hours(5))
            .unwrap();
        let tampered = flip_last_signature_char(&codec.issue(MemberId(1)).unwrap());

        let errors = [
            codec.validate(&expired).unwrap_err(),
            codec.validate(&tampered).unwrap_err(),
            codec.validate("garbage").unwrap_err(),
        ];
        assert!(errors.iter().all(|e| *e == AuthError::InvalidToken));
    }

    #[test]
    fn test_lifetime_out_of_range_rejected() {
        assert_eq!(
            TokenCodec::with_secret(SECRET, Duration::zero()).unwrap_err(),
            ConfigValidationError::LifetimeOutOfRange(0)
        );
        assert_eq!(
            TokenCodec::with_secret(SECRET, Duration::minutes(-30)).unwrap_err(),
            ConfigValidationError::LifetimeOutOfRange(-1800)
        );

        let too_long = Duration::hours(MAX_TOKEN_LIFETIME_HOURS) + Duration::seconds(1);
        assert_eq!(
            TokenCodec::with_secret(SECRET, too_long).unwrap_err(),
            ConfigValidationError::LifetimeOutOfRange(too_long.num_seconds())
        );
        assert!(TokenCodec::with_secret(SECRET, Duration::hours(MAX_TOKEN_LIFETIME_HOURS)).is_ok());
    }

    #[test]
    fn test_new_rejects_oversized_configured_lifetime() {
        let config = AuthConfig {
            jwt_secret: Some(String::from_utf8(SECRET.to_vec()).unwrap()),
            token_lifetime_hours: 3_000_000_000,
            ..AuthConfig::default()
        };
        assert_eq!(
            TokenCodec::new(&config).unwrap_err(),
            ConfigValidationError::LifetimeTooLong(3_000_000_000)
        );
    }

    #[test]
    fn test_issue_near_end_of_time_errors_instead_of_panicking() {
        let codec = codec();
        let now = DateTime::<Utc>::MAX_UTC - Duration::minutes(1);
        assert!(matches!(
            codec.issue_at(MemberId(1), now),
            Err(AuthError::Internal(_))
        ));
    }

    #[test]
    fn test_new_requires_secret() {
        assert_eq!(
            TokenCodec::new(&AuthConfig::default()).unwrap_err(),
            ConfigValidationError::MissingJwtSecret
        );
    }
}
