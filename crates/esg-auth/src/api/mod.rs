//! HTTP API: routes, handlers and error mapping.

mod error;
mod handlers;
mod routes;
mod state;

pub use error::{ApiError, ErrorResponse};
pub use handlers::{ApiResult, HealthResponse, MessageResponse};
pub use routes::{CONTENT_SECURITY_POLICY, create_router};
pub use state::{AppState, HttpSettings};
