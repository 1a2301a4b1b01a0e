use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

struct Expiring<T> {
    value: T,
    expires_at: DateTime<Utc>,
}

/// Entries past their expiry read as absent and are dropped on access.
pub struct MemoryRevocationStore {
    blacklist: DashMap<TokenDigest, Expiring<()>>,
    epochs: DashMap<UserId, Expiring<i64>>,
    clock: Arc<dyn Clock>,
}

impl MemoryRevocationStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        MemoryRevocationStore {
            blacklist: DashMap::new(),
            epochs: DashMap::new(),
            clock,
        }
    }

    fn deadline(&self, ttl: Duration) -> Result<DateTime<Utc>, AuthError> {
        let ttl = chrono::Duration::from_std(ttl).map_err(|e| AuthError::Store(e.to_string()))?;
        Ok(self.clock.now() + ttl)
    }

    /// Drops every expired entry.
    pub fn evict_expired(&self) {
        let now = self.clock.now();
        self.blacklist.retain(|_, entry| entry.expires_at > now);
        self.epochs.retain(|_, entry| entry.expires_at > now);
    }
}

#[async_trait::async_trait]
impl RevocationStore for MemoryRevocationStore {
    async fn put_blacklisted(
        &self,
        token_hash: &TokenDigest,
        ttl: Duration,
    ) -> Result<(), AuthError> {
        let expires_at = self.deadline(ttl)?;
        self.blacklist.insert(
            token_hash.clone(),
            Expiring {
                value: (),
                expires_at,
            },
        );
        Ok(())
    }

    async fn is_blacklisted(&self, token_hash: &TokenDigest) -> Result<bool, AuthError> {
        let now = self.clock.now();
        let live = match self.blacklist.get(token_hash) {
            Some(entry) => entry.expires_at > now,
            None => return Ok(false),
        };
        if !live {
            self.blacklist.remove_if(token_hash, |_, entry| entry.expires_at <= now);
        }
        Ok(live)
    }

    async fn put_user_epoch(
        &self,
        user_id: UserId,
        epoch_micros: i64,
        ttl: Duration,
    ) -> Result<(), AuthError> {
        let now = self.clock.now();
        let expires_at = self.deadline(ttl)?;
        self.epochs
            .entry(user_id)
            .and_modify(|entry| {
                if entry.expires_at <= now {
                    entry.value = epoch_micros;
                    entry.expires_at = expires_at;
                } else {
                    entry.value = entry.value.max(epoch_micros);
                    entry.expires_at = entry.expires_at.max(expires_at);
                }
            })
            .or_insert(Expiring {
                value: epoch_micros,
                expires_at,
            });
        Ok(())
    }

    async fn get_user_epoch(&self, user_id: UserId) -> Result<Option<i64>, AuthError> {
        let now = self.clock.now();
        let found = self
            .epochs
            .get(&user_id)
            .map(|entry| (entry.value, entry.expires_at > now));
        match found {
            Some((epoch, true)) => Ok(Some(epoch)),
            Some((_, false)) => {
                self.epochs.remove_if(&user_id, |_, entry| entry.expires_at <= now);
                Ok(None)
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra_memory::ManualClock;

    #[tokio::test]
    async fn entries_expire_with_the_clock() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = MemoryRevocationStore::new(clock.clone());
        let hash = TokenDigest::of("t");
        let user = UserId::new();

        store.put_blacklisted(&hash, Duration::from_secs(2)).await.unwrap();
        store.put_user_epoch(user, 42, Duration::from_secs(4)).await.unwrap();
        assert!(store.is_blacklisted(&hash).await.unwrap());
        assert_eq!(store.get_user_epoch(user).await.unwrap(), Some(42));

        clock.advance(chrono::Duration::seconds(2));
        assert!(!store.is_blacklisted(&hash).await.unwrap());
        assert_eq!(store.get_user_epoch(user).await.unwrap(), Some(42));

        clock.advance(chrono::Duration::seconds(2));
        assert_eq!(store.get_user_epoch(user).await.unwrap(), None);
    }

    #[tokio::test]
    async fn short_epoch_window_never_cuts_a_longer_one() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = MemoryRevocationStore::new(clock.clone());
        let user = UserId::new();

        store.put_user_epoch(user, 100, Duration::from_secs(3600)).await.unwrap();
        store.put_user_epoch(user, 101, Duration::from_secs(5)).await.unwrap();
        assert_eq!(store.get_user_epoch(user).await.unwrap(), Some(101));

        clock.advance(chrono::Duration::seconds(60));
        assert_eq!(store.get_user_epoch(user).await.unwrap(), Some(101));

        clock.advance(chrono::Duration::seconds(3600));
        assert_eq!(store.get_user_epoch(user).await.unwrap(), None);
    }

    #[tokio::test]
    async fn eviction_keeps_live_entries() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = MemoryRevocationStore::new(clock.clone());
        store.put_blacklisted(&TokenDigest::of("short"), Duration::from_secs(1)).await.unwrap();
        store.put_blacklisted(&TokenDigest::of("long"), Duration::from_secs(60)).await.unwrap();
        clock.advance(chrono::Duration::seconds(5));
        store.evict_expired();
        assert_eq!(store.blacklist.len(), 1);
        assert!(store.is_blacklisted(&TokenDigest::of("long")).await.unwrap());
    }
}
