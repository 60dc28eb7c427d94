//! ESG member authentication service.
//!
//! Issues and validates identity tokens, manages member accounts and profile
//! images, and binds the calling member to each HTTP request.

pub mod api;
pub mod auth;
pub mod db;
pub mod member;
pub mod metrics;
pub mod storage;
