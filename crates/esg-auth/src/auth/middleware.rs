//! Authentication middleware.

use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts, Request, State},
    http::{HeaderMap, header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use tracing::{debug, trace};

use super::{AuthError, MemberId, TokenCodec};

const BEARER_PREFIX: &str = "Bearer ";

/// Extract a Bearer token from an Authorization header value.
///
/// The scheme must be exactly `Bearer ` and the remainder non-empty.
fn bearer_token_from_header(header_value: &str) -> Option<&str> {
    header_value
        .strip_prefix(BEARER_PREFIX)
        .filter(|token| !token.is_empty())
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(bearer_token_from_header)
}

/// Authenticated member bound to the current request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentMember {
    pub id: MemberId,
}

impl CurrentMember {
    pub fn id(&self) -> MemberId {
        self.id
    }
}

/// Extract the bound member from request extensions.
impl<S> FromRequestParts<S> for CurrentMember
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentMember>()
            .copied()
            .ok_or(AuthError::Unauthenticated)
    }
}

impl<S> OptionalFromRequestParts<S> for CurrentMember
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<CurrentMember>().copied())
    }
}

/// Authentication middleware.
///
/// Binds `CurrentMember` into request extensions when a valid Bearer token is
/// present. Never rejects: a missing or invalid token just leaves the request
/// unauthenticated, and access rules decide what that means.
pub async fn auth_middleware(
    State(codec): State<TokenCodec>,
    mut req: Request,
    next: Next,
) -> Response {
    let member = match bearer_token(req.headers()) {
        Some(token) => match codec.validate(token) {
            Ok(id) => Some(id),
            Err(_) => {
                debug!(path = %req.uri().path(), "ignoring invalid bearer token");
                None
            }
        },
        None => {
            trace!(path = %req.uri().path(), "no bearer token");
            None
        }
    };

    if let Some(id) = member {
        req.extensions_mut().insert(CurrentMember { id });
    }

    next.run(req).await
}
