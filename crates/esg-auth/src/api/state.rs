//! Application state shared across handlers.

use std::path::PathBuf;
use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;

use crate::auth::{AccessPolicy, TokenCodec};
use crate::member::MemberService;

/// HTTP-level settings resolved from configuration.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    /// Allowed CORS origins. Empty denies all cross-origin requests.
    pub allowed_origins: Vec<String>,
    /// Directory uploaded images are served from.
    pub upload_dir: PathBuf,
    /// URL prefix uploaded images are served under.
    pub public_prefix: String,
    /// Request body limit in bytes.
    pub max_upload_bytes: usize,
}

/// Application state.
#[derive(Clone)]
pub struct AppState {
    /// Member account operations.
    pub members: MemberService,
    /// Token codec used by the authentication middleware.
    pub codec: TokenCodec,
    /// Route access rules.
    pub policy: Arc<AccessPolicy>,
    /// HTTP settings.
    pub http: Arc<HttpSettings>,
    /// Prometheus render handle. `/metrics` is only routed when set.
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    /// Create new application state.
    pub fn new(
        members: MemberService,
        codec: TokenCodec,
        policy: AccessPolicy,
        http: HttpSettings,
    ) -> Self {
        Self {
            members,
            codec,
            policy: Arc::new(policy),
            http: Arc::new(http),
            metrics: None,
        }
    }

    /// Serve counters from `handle` at `/metrics`.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}
