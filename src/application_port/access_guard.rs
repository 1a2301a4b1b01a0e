use crate::application_port::AuthError;
use crate::domain_model::UserId;
use chrono::{DateTime, Utc};

/// What a request that passed the guard carries downstream.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: UserId,
    pub email: String,
    pub expires_at: DateTime<Utc>,
}

#[async_trait::async_trait]
pub trait AccessGuard: Send + Sync {
    async fn admit(&self, access_token: &str) -> Result<AuthContext, AuthError>;
}
