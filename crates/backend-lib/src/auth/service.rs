use crate::error::AppError;
use async_trait::async_trait;
use chatware_common::UserId;

#[async_trait]
pub trait AuthService: Send + Sync {
    /// Map a bearer token to a user identity, or fail with `AppError::Auth`.
    async fn identify(&self, token: &str) -> Result<UserId, AppError>;
}
