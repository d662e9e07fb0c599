// ============================
// chatware-backend-lib/src/auth/service_impl.rs
// ============================
//! In-memory token-table implementation of the auth seam.
use crate::error::AppError;
use async_trait::async_trait;
use chatware_common::UserId;
use dashmap::DashMap;
use uuid::Uuid;

use super::AuthService;

/// Token table backed by a shared map. Production deployments substitute a
/// real verifier behind the same trait; this implementation serves the dev
/// binary and the test suite.
#[derive(Default)]
pub struct DefaultAuth {
    tokens: DashMap<String, UserId>,
}

impl DefaultAuth {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a fresh bearer token for a user identity
    pub fn issue(&self, user_id: &str) -> String {
        let token = Uuid::new_v4().to_string();
        self.tokens.insert(token.clone(), user_id.to_string());
        token
    }

    /// Revoke a previously issued token; no-op if unknown
    pub fn revoke(&self, token: &str) {
        self.tokens.remove(token);
    }
}

#[async_trait]
impl AuthService for DefaultAuth {
    async fn identify(&self, token: &str) -> Result<UserId, AppError> {
        self.tokens
            .get(token)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| AppError::Auth("Invalid token".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_issue_and_identify() {
        let auth = DefaultAuth::new();
        let token = auth.issue("alice");
        assert_eq!(auth.identify(&token).await.unwrap(), "alice");
    }

    #[tokio::test]
    async fn test_revoked_token_fails() {
        let auth = DefaultAuth::new();
        let token = auth.issue("alice");
        auth.revoke(&token);
        assert!(auth.identify(&token).await.is_err());
    }
}
