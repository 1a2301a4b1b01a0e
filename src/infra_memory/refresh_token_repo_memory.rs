use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

/// Compare-and-set transitions run under the shard lock of the record.
#[derive(Default)]
pub struct MemoryRefreshTokenRepo {
    records: DashMap<RefreshRecordId, RefreshTokenRecord>,
    by_hash: DashMap<TokenDigest, RefreshRecordId>,
}

impl MemoryRefreshTokenRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait::async_trait]
impl RefreshTokenRepo for MemoryRefreshTokenRepo {
    async fn insert(&self, record: &RefreshTokenRecord) -> Result<(), AuthError> {
        if self.by_hash.contains_key(&record.token_hash) {
            return Err(AuthError::Store("duplicate refresh token hash".to_string()));
        }
        self.records.insert(record.id, record.clone());
        self.by_hash.insert(record.token_hash.clone(), record.id);
        Ok(())
    }

    async fn find_by_hash(
        &self,
        token_hash: &TokenDigest,
    ) -> Result<Option<RefreshTokenRecord>, AuthError> {
        let Some(id) = self.by_hash.get(token_hash).map(|id| *id) else {
            return Ok(None);
        };
        Ok(self.records.get(&id).map(|r| r.clone()))
    }

    async fn find_by_id(
        &self,
        id: RefreshRecordId,
    ) -> Result<Option<RefreshTokenRecord>, AuthError> {
        Ok(self.records.get(&id).map(|r| r.clone()))
    }

    async fn revoke_if_active(
        &self,
        id: RefreshRecordId,
        replaced_by: Option<RefreshRecordId>,
        revoked_at: DateTime<Utc>,
    ) -> Result<bool, AuthError> {
        let Some(mut record) = self.records.get_mut(&id) else {
            return Ok(false);
        };
        if record.revoked_at.is_some() {
            return Ok(false);
        }
        record.revoked_at = Some(revoked_at);
        if replaced_by.is_some() {
            record.replaced_by = replaced_by;
        }
        Ok(true)
    }

    async fn attach_grace_if_unset(
        &self,
        id: RefreshRecordId,
        replaced_by: RefreshRecordId,
        grace_token_hash: &TokenDigest,
        grace_ends_at: DateTime<Utc>,
    ) -> Result<bool, AuthError> {
        let Some(mut record) = self.records.get_mut(&id) else {
            return Ok(false);
        };
        if record.revoked_at.is_some() || record.grace_period_token_hash.is_some() {
            return Ok(false);
        }
        record.replaced_by = Some(replaced_by);
        record.grace_period_token_hash = Some(grace_token_hash.clone());
        record.grace_period_ends_at = Some(grace_ends_at);
        Ok(true)
    }

    async fn revoke_all_for_user(
        &self,
        owner: UserId,
        revoked_at: DateTime<Utc>,
    ) -> Result<u64, AuthError> {
        let mut count = 0;
        for mut record in self.records.iter_mut() {
            if record.owner == owner && record.revoked_at.is_none() {
                record.revoked_at = Some(revoked_at);
                count += 1;
            }
        }
        Ok(count)
    }

    async fn delete_expired(&self, before: DateTime<Utc>, limit: u32) -> Result<u64, AuthError> {
        let expired: Vec<(RefreshRecordId, TokenDigest)> = self
            .records
            .iter()
            .filter(|r| r.expires_at <= before)
            .take(limit as usize)
            .map(|r| (r.id, r.token_hash.clone()))
            .collect();

        let mut count = 0;
        for (id, hash) in expired {
            if self.records.remove(&id).is_some() {
                self.by_hash.remove(&hash);
                count += 1;
            }
        }
        Ok(count)
    }
}
