use crate::domain_model::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

#[derive(
    Debug, Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[sqlx(transparent)]
pub struct RefreshRecordId(pub uuid::Uuid);

impl RefreshRecordId {
    pub fn new() -> Self {
        RefreshRecordId(uuid::Uuid::new_v4())
    }
}

impl fmt::Display for RefreshRecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for RefreshRecordId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        uuid::Uuid::from_str(s).map(RefreshRecordId)
    }
}

/// Hex-encoded SHA-256 of a raw signed token. Raw tokens are never stored;
/// every persisted or cached key is one of these.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TokenDigest(String);

impl TokenDigest {
    pub fn of(raw_token: &str) -> Self {
        let digest = Sha256::digest(raw_token.as_bytes());
        TokenDigest(hex::encode(digest))
    }

    pub fn from_hex(hex: impl Into<String>) -> Self {
        TokenDigest(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TokenDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    Active,
    GracePeriod,
    Revoked,
}

#[derive(Debug, Clone)]
pub struct RefreshTokenRecord {
    pub id: RefreshRecordId,
    pub owner: UserId,
    pub token_hash: TokenDigest,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub replaced_by: Option<RefreshRecordId>,
    /// Set together with `grace_period_ends_at`, never alone.
    pub grace_period_token_hash: Option<TokenDigest>,
    pub grace_period_ends_at: Option<DateTime<Utc>>,
}

impl RefreshTokenRecord {
    pub fn new(
        id: RefreshRecordId,
        owner: UserId,
        token_hash: TokenDigest,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        RefreshTokenRecord {
            id,
            owner,
            token_hash,
            issued_at,
            expires_at,
            revoked_at: None,
            replaced_by: None,
            grace_period_token_hash: None,
            grace_period_ends_at: None,
        }
    }

    /// An elapsed grace window counts as revoked whether or not the deferred
    /// revocation has landed yet.
    pub fn state(&self, now: DateTime<Utc>) -> RecordState {
        if self.revoked_at.is_some() {
            return RecordState::Revoked;
        }
        match self.grace_period_ends_at {
            Some(ends_at) if ends_at <= now => RecordState::Revoked,
            Some(_) => RecordState::GracePeriod,
            None => RecordState::Active,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn lifetime(&self) -> chrono::Duration {
        self.expires_at - self.issued_at
    }
}
