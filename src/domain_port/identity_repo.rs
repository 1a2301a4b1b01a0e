use crate::application_port::*;
use crate::domain_model::*;

#[async_trait::async_trait]
pub trait IdentityRepo: Send + Sync {
    /// Fails with `UserExists` when the email is already taken.
    async fn create(&self, identity: &Identity) -> Result<(), AuthError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, AuthError>;

    async fn find_by_id(&self, user_id: UserId) -> Result<Option<Identity>, AuthError>;

    /// Returns false when no row matched.
    async fn update_password_hash(
        &self,
        user_id: UserId,
        password_hash: &str,
    ) -> Result<bool, AuthError>;
}
