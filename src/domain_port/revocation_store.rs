use crate::application_port::*;
use crate::domain_model::*;
use std::time::Duration;

/// Keyed store with per-entry expiry holding the access-token blacklist and
/// per-user revocation epochs.
#[async_trait::async_trait]
pub trait RevocationStore: Send + Sync {
    async fn put_blacklisted(&self, token_hash: &TokenDigest, ttl: Duration)
    -> Result<(), AuthError>;

    async fn is_blacklisted(&self, token_hash: &TokenDigest) -> Result<bool, AuthError>;

    /// Epochs are unix microseconds. A later epoch replaces an earlier one,
    /// but an entry that is still live keeps the longer of its remaining
    /// lifetime and `ttl`.
    async fn put_user_epoch(
        &self,
        user_id: UserId,
        epoch_micros: i64,
        ttl: Duration,
    ) -> Result<(), AuthError>;

    async fn get_user_epoch(&self, user_id: UserId) -> Result<Option<i64>, AuthError>;
}
