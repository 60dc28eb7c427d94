//! Route access rules.
//!
//! A static table decides which routes need a bound member. Rules are checked
//! in declaration order and the first match wins; unmatched routes fall back to
//! the policy default.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::Method,
    middleware::Next,
    response::Response,
};
use tracing::debug;

use super::{AuthError, CurrentMember};

/// What a route demands of the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    RequiresIdentity,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum PathPattern {
    Any,
    Exact(String),
    /// Stored with its trailing slash, e.g. `/images/`.
    Prefix(String),
}

impl PathPattern {
    fn parse(pattern: &str) -> Self {
        if pattern == "*" || pattern == "/*" {
            PathPattern::Any
        } else if let Some(base) = pattern.strip_suffix('*') {
            if base.ends_with('/') {
                PathPattern::Prefix(base.to_string())
            } else {
                PathPattern::Exact(pattern.to_string())
            }
        } else {
            PathPattern::Exact(pattern.to_string())
        }
    }

    fn matches(&self, path: &str) -> bool {
        match self {
            PathPattern::Any => true,
            PathPattern::Exact(exact) => path == exact,
            PathPattern::Prefix(prefix) => {
                path.starts_with(prefix.as_str()) || path == prefix.trim_end_matches('/')
            }
        }
    }
}

#[derive(Debug, Clone)]
struct Rule {
    method: Option<Method>,
    pattern: PathPattern,
    access: Access,
}

/// Ordered access rules with a fallback.
#[derive(Debug, Clone)]
pub struct AccessPolicy {
    rules: Vec<Rule>,
    default: Access,
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self::new(Access::RequiresIdentity)
    }
}

impl AccessPolicy {
    /// Empty policy that applies `default` to every route.
    pub fn new(default: Access) -> Self {
        Self {
            rules: Vec::new(),
            default,
        }
    }

    /// Rules for the member service.
    ///
    /// Preflight requests, registration, login, health and uploaded images are
    /// public. Everything else needs a bound member.
    pub fn member_service(public_prefix: &str) -> Self {
        let images = format!("{}/*", public_prefix.trim_end_matches('/'));
        Self::default()
            .rule(Some(Method::OPTIONS), "*", Access::Public)
            .rule(Some(Method::POST), "/auth/register", Access::Public)
            .rule(Some(Method::POST), "/auth/login", Access::Public)
            .rule(Some(Method::GET), "/health", Access::Public)
            .rule(None, &images, Access::Public)
    }

    /// Append a rule. `method = None` matches any method.
    pub fn rule(mut self, method: Option<Method>, pattern: &str, access: Access) -> Self {
        self.rules.push(Rule {
            method,
            pattern: PathPattern::parse(pattern),
            access,
        });
        self
    }

    /// Append a public rule for `pattern`.
    pub fn public(self, method: Option<Method>, pattern: &str) -> Self {
        self.rule(method, pattern, Access::Public)
    }

    /// Access requirement for a request.
    pub fn requirement(&self, method: &Method, path: &str) -> Access {
        self.rules
            .iter()
            .find(|rule| {
                rule.method.as_ref().is_none_or(|m| m == method) && rule.pattern.matches(path)
            })
            .map(|rule| rule.access)
            .unwrap_or(self.default)
    }
}

/// Reject requests to protected routes that carry no bound member.
///
/// Must run after `auth_middleware`.
pub async fn enforce_access(
    State(policy): State<Arc<AccessPolicy>>,
    req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let access = policy.requirement(req.method(), req.uri().path());

    if access == Access::RequiresIdentity && req.extensions().get::<CurrentMember>().is_none() {
        debug!(method = %req.method(), path = %req.uri().path(), "unauthenticated request to protected route");
        return Err(AuthError::Unauthenticated);
    }

    Ok(next.run(req).await)
}
