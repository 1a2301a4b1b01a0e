use crate::application_port::*;
use crate::domain_model::*;
use chrono::{DateTime, Utc};

/// Durable storage for [`RefreshTokenRecord`]s.
///
/// The two `*_if_*` transitions must be atomic compare-and-set updates at
/// the storage layer: concurrent callers for the same record see exactly
/// one `true`.
#[async_trait::async_trait]
pub trait RefreshTokenRepo: Send + Sync {
    async fn insert(&self, record: &RefreshTokenRecord) -> Result<(), AuthError>;

    async fn find_by_hash(
        &self,
        token_hash: &TokenDigest,
    ) -> Result<Option<RefreshTokenRecord>, AuthError>;

    async fn find_by_id(
        &self,
        id: RefreshRecordId,
    ) -> Result<Option<RefreshTokenRecord>, AuthError>;

    /// Sets `revoked_at` only if it is currently unset. `replaced_by` is
    /// written when given and left alone otherwise.
    async fn revoke_if_active(
        &self,
        id: RefreshRecordId,
        replaced_by: Option<RefreshRecordId>,
        revoked_at: DateTime<Utc>,
    ) -> Result<bool, AuthError>;

    /// Attaches the replacement token to a record that is neither revoked
    /// nor already carrying a grace period.
    async fn attach_grace_if_unset(
        &self,
        id: RefreshRecordId,
        replaced_by: RefreshRecordId,
        grace_token_hash: &TokenDigest,
        grace_ends_at: DateTime<Utc>,
    ) -> Result<bool, AuthError>;

    /// Returns how many records changed.
    async fn revoke_all_for_user(
        &self,
        owner: UserId,
        revoked_at: DateTime<Utc>,
    ) -> Result<u64, AuthError>;

    async fn delete_expired(&self, before: DateTime<Utc>, limit: u32) -> Result<u64, AuthError>;
}
