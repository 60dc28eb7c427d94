//! Authentication module.
//!
//! Provides token issuing and validation, password hashing, the request
//! identity middleware and the route access policy.

mod claims;
mod codec;
mod config;
mod error;
mod middleware;
mod password;
mod policy;

pub use claims::{Claims, MemberId};
pub use codec::TokenCodec;
pub use config::{AuthConfig, ConfigValidationError};
pub use error::{AuthError, AuthErrorResponse};
pub use middleware::{CurrentMember, auth_middleware};
pub use password::{BcryptHasher, CredentialVerifier, MAX_SECRET_BYTES, PasswordHasher};
pub use policy::{Access, AccessPolicy, enforce_access};
