//! Token claims and the member identity they assert.

use serde::{Deserialize, Serialize};

/// Member identifier.
///
/// This is the only fact a validated token asserts about its bearer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[serde(transparent)]
#[sqlx(transparent)]
pub struct MemberId(pub i64);

impl MemberId {
    /// Raw numeric value.
    pub fn get(self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for MemberId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for MemberId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<i64>()
            .map(MemberId)
            .map_err(|_| format!("invalid member id: {}", s))
    }
}

impl From<i64> for MemberId {
    fn from(value: i64) -> Self {
        MemberId(value)
    }
}

/// JWT claims structure.
///
/// Carries nothing beyond the subject and its validity window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (member ID, decimal string).
    pub sub: String,

    /// Issued at (as Unix timestamp).
    pub iat: i64,

    /// Expiration time (as Unix timestamp).
    pub exp: i64,
}

impl Claims {
    /// Build claims for `member` valid from `issued_at` until `expires_at`.
    pub fn new(member: MemberId, issued_at: i64, expires_at: i64) -> Self {
        Self {
            sub: member.to_string(),
            iat: issued_at,
            exp: expires_at,
        }
    }

    /// Parse the subject back into a member ID.
    pub fn member_id(&self) -> Option<MemberId> {
        self.sub.parse().ok()
    }

    /// Whether the claims are still inside their validity window at `now`.
    pub fn is_live_at(&self, now: i64) -> bool {
        now < self.exp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_id_display_and_parse() {
        let id = MemberId(42);
        assert_eq!(id.to_string(), "42");
        assert_eq!("42".parse::<MemberId>().unwrap(), id);
        assert!("abc".parse::<MemberId>().is_err());
        assert!("".parse::<MemberId>().is_err());
    }

    #[test]
    fn test_member_id_serializes_as_number() {
        let json = serde_json::to_string(&MemberId(7)).unwrap();
        assert_eq!(json, "7");
    }

    #[test]
    fn test_claims_member_id() {
        let claims = Claims::new(MemberId(12), 100, 200);
        assert_eq!(claims.sub, "12");
        assert_eq!(claims.member_id(), Some(MemberId(12)));

        let garbage = Claims {
            sub: "not-a-number".to_string(),
            ..claims
        };
        assert_eq!(garbage.member_id(), None);
    }

    #[test]
    fn test_claims_liveness_is_strict() {
        let claims = Claims::new(MemberId(1), 100, 200);
        assert!(claims.is_live_at(100));
        assert!(claims.is_live_at(199));
        assert!(!claims.is_live_at(200));
        assert!(!claims.is_live_at(201));
    }
}
