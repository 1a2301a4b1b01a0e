use super::bounded;
use crate::application_port::{AuthError, RefreshToken};
use crate::domain_model::*;
use crate::domain_port::{Clock, RefreshTokenRepo};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

/// Record of every refresh token ever issued, addressed by token digest.
pub struct RefreshTokenLedger {
    repo: Arc<dyn RefreshTokenRepo>,
    clock: Arc<dyn Clock>,
    call_timeout: Duration,
}

impl RefreshTokenLedger {
    pub fn new(repo: Arc<dyn RefreshTokenRepo>, clock: Arc<dyn Clock>, call_timeout: Duration) -> Self {
        RefreshTokenLedger {
            repo,
            clock,
            call_timeout,
        }
    }

    pub async fn create_record(
        &self,
        id: RefreshRecordId,
        owner: UserId,
        raw_token: &RefreshToken,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<RefreshTokenRecord, AuthError> {
        let record = RefreshTokenRecord::new(
            id,
            owner,
            TokenDigest::of(&raw_token.0),
            issued_at,
            expires_at,
        );
        bounded(self.call_timeout, "ledger.insert", self.repo.insert(&record)).await?;
        Ok(record)
    }

    pub async fn find_by_raw_token(
        &self,
        raw_token: &str,
    ) -> Result<Option<RefreshTokenRecord>, AuthError> {
        let hash = TokenDigest::of(raw_token);
        bounded(self.call_timeout, "ledger.find", self.repo.find_by_hash(&hash)).await
    }

    pub async fn find_by_id(
        &self,
        id: RefreshRecordId,
    ) -> Result<Option<RefreshTokenRecord>, AuthError> {
        bounded(self.call_timeout, "ledger.find", self.repo.find_by_id(id)).await
    }

    /// Idempotent. Returns the record as stored afterwards, or `None` if it
    /// no longer exists.
    pub async fn revoke(
        &self,
        id: RefreshRecordId,
        replaced_by: Option<RefreshRecordId>,
    ) -> Result<Option<RefreshTokenRecord>, AuthError> {
        let now = self.clock.now();
        let changed = bounded(
            self.call_timeout,
            "ledger.revoke",
            self.repo.revoke_if_active(id, replaced_by, now),
        )
        .await?;
        if changed {
            tracing::debug!(record_id = %id, "refresh record revoked");
        }
        self.find_by_id(id).await
    }

    /// Attaches `new_token` to the old record so it can be redeemed again
    /// until `grace` elapses. `None` means another rotation got there first
    /// or the record was revoked meanwhile.
    pub async fn set_grace_period(
        &self,
        id: RefreshRecordId,
        replaced_by: RefreshRecordId,
        new_token: &RefreshToken,
        grace: Duration,
    ) -> Result<Option<RefreshTokenRecord>, AuthError> {
        let ends_at = self.clock.now() + grace;
        let hash = TokenDigest::of(&new_token.0);
        let attached = bounded(
            self.call_timeout,
            "ledger.grace",
            self.repo.attach_grace_if_unset(id, replaced_by, &hash, ends_at),
        )
        .await?;
        if !attached {
            return Ok(None);
        }
        self.find_by_id(id).await
    }

    pub async fn revoke_all_for_user(&self, owner: UserId) -> Result<u64, AuthError> {
        let now = self.clock.now();
        bounded(
            self.call_timeout,
            "ledger.revoke_all",
            self.repo.revoke_all_for_user(owner, now),
        )
        .await
    }

    pub async fn purge_expired(&self, batch: u32) -> Result<u64, AuthError> {
        let now = self.clock.now();
        bounded(
            self.call_timeout,
            "ledger.purge",
            self.repo.delete_expired(now, batch),
        )
        .await
    }
}
