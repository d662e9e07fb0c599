// ============================
// chatware-backend-lib/src/auth/mod.rs
// ============================
//! Authentication seam.
//!
//! Credential verification is an external collaborator: the server only needs
//! a capability that maps a bearer token to a user identity or rejects it.

mod service;
mod service_impl;

pub use service::AuthService;
pub use service_impl::DefaultAuth;

use crate::error::AppError;
use axum::http::{header, HeaderMap};
use chatware_common::UserId;

/// Resolve the `Authorization: Bearer` header to a user identity.
pub async fn bearer_identity(
    auth: &dyn AuthService,
    headers: &HeaderMap,
) -> Result<UserId, AppError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?;

    let token = value
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Auth("Malformed authorization header".to_string()))?;

    auth.identify(token).await
}
