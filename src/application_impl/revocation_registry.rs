use super::bounded;
use crate::application_port::{AuthError, TokenCodec};
use crate::domain_model::{TokenDigest, UserId};
use crate::domain_port::{Clock, RevocationStore};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

/// Access-token blacklist and per-user revocation epochs on top of a
/// [`RevocationStore`].
///
/// Epochs are taken from [`Clock::stamp`], the same sequence access tokens
/// are stamped with, so a token minted after the epoch was raised is never
/// mistaken for one minted before it, even within the same clock tick.
pub struct RevocationRegistry {
    store: Arc<dyn RevocationStore>,
    codec: Arc<dyn TokenCodec>,
    clock: Arc<dyn Clock>,
    call_timeout: Duration,
}

impl RevocationRegistry {
    pub fn new(
        store: Arc<dyn RevocationStore>,
        codec: Arc<dyn TokenCodec>,
        clock: Arc<dyn Clock>,
        call_timeout: Duration,
    ) -> Self {
        RevocationRegistry {
            store,
            codec,
            clock,
            call_timeout,
        }
    }

    /// Blacklists a raw access token for exactly its remaining lifetime.
    /// Expired or undecodable tokens need no entry.
    pub async fn blacklist_token(&self, raw_token: &str) -> Result<(), AuthError> {
        let Some(expires_at) = self.codec.peek_expiry(raw_token) else {
            tracing::debug!("blacklist skipped: token carries no readable expiry");
            return Ok(());
        };
        let remaining = expires_at - self.clock.now();
        let millis = remaining.num_milliseconds();
        if millis <= 0 {
            return Ok(());
        }
        let ttl = Duration::from_secs(((millis + 999) / 1000) as u64);
        let hash = TokenDigest::of(raw_token);
        bounded(
            self.call_timeout,
            "revocation.blacklist",
            self.store.put_blacklisted(&hash, ttl),
        )
        .await
    }

    pub async fn is_blacklisted(&self, raw_token: &str) -> Result<bool, AuthError> {
        let hash = TokenDigest::of(raw_token);
        bounded(
            self.call_timeout,
            "revocation.is_blacklisted",
            self.store.is_blacklisted(&hash),
        )
        .await
    }

    /// `window` must cover the longest-lived access token still outstanding,
    /// otherwise the epoch lapses before the tokens it is meant to reject.
    pub async fn set_user_revocation_epoch(
        &self,
        user_id: UserId,
        window: Duration,
    ) -> Result<DateTime<Utc>, AuthError> {
        let epoch = self.clock.stamp();
        bounded(
            self.call_timeout,
            "revocation.set_epoch",
            self.store.put_user_epoch(user_id, epoch.timestamp_micros(), window),
        )
        .await?;
        Ok(epoch)
    }

    pub async fn get_user_revocation_epoch(
        &self,
        user_id: UserId,
    ) -> Result<Option<DateTime<Utc>>, AuthError> {
        let epoch = bounded(
            self.call_timeout,
            "revocation.get_epoch",
            self.store.get_user_epoch(user_id),
        )
        .await?;
        Ok(epoch.and_then(DateTime::from_timestamp_micros))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application_impl::JwtHs256Codec;
    use crate::application_impl::jwt_codec::tests::test_config;
    use crate::infra_memory::{ManualClock, MemoryRevocationStore};
    use chrono::TimeZone;

    struct Fixture {
        registry: RevocationRegistry,
        codec: Arc<JwtHs256Codec>,
        clock: Arc<ManualClock>,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 2, 2, 10, 0, 0).unwrap(),
        ));
        let codec = Arc::new(JwtHs256Codec::new(test_config(), clock.clone()));
        let store = Arc::new(MemoryRevocationStore::new(clock.clone()));
        let registry =
            RevocationRegistry::new(store, codec.clone(), clock.clone(), Duration::from_secs(1));
        Fixture {
            registry,
            codec,
            clock,
        }
    }

    #[tokio::test]
    async fn blacklist_lives_exactly_as_long_as_the_token() {
        let f = fixture();
        let (token, _) = f.codec.issue_access_token(UserId::new(), "a@x.com").await.unwrap();

        f.registry.blacklist_token(&token.0).await.unwrap();
        assert!(f.registry.is_blacklisted(&token.0).await.unwrap());

        f.clock.advance(chrono::Duration::seconds(15 * 60 - 1));
        assert!(f.registry.is_blacklisted(&token.0).await.unwrap());
        f.clock.advance(chrono::Duration::seconds(1));
        assert!(!f.registry.is_blacklisted(&token.0).await.unwrap());
    }

    #[tokio::test]
    async fn blacklisting_expired_or_garbage_tokens_is_a_noop() {
        let f = fixture();
        let (token, _) = f.codec.issue_access_token(UserId::new(), "a@x.com").await.unwrap();
        f.clock.advance(chrono::Duration::minutes(20));

        f.registry.blacklist_token(&token.0).await.unwrap();
        assert!(!f.registry.is_blacklisted(&token.0).await.unwrap());

        f.registry.blacklist_token("garbage").await.unwrap();
        assert!(!f.registry.is_blacklisted("garbage").await.unwrap());
    }

    #[tokio::test]
    async fn epoch_sits_between_earlier_and_later_tokens_and_expires_with_its_window() {
        let f = fixture();
        let user = UserId::new();
        assert!(f.registry.get_user_revocation_epoch(user).await.unwrap().is_none());

        let (before, _) = f.codec.issue_access_token(user, "a@x.com").await.unwrap();
        let epoch = f
            .registry
            .set_user_revocation_epoch(user, Duration::from_secs(5))
            .await
            .unwrap();
        let (after, _) = f.codec.issue_access_token(user, "a@x.com").await.unwrap();
        let before = f.codec.verify_access_token(&before).await.unwrap().issued_at.unwrap();
        let after = f.codec.verify_access_token(&after).await.unwrap().issued_at.unwrap();
        assert!(before < epoch && epoch < after);
        assert!(epoch - f.clock.now() < chrono::Duration::milliseconds(1));
        assert_eq!(f.registry.get_user_revocation_epoch(user).await.unwrap(), Some(epoch));

        f.clock.advance(chrono::Duration::seconds(5));
        assert!(f.registry.get_user_revocation_epoch(user).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn later_epoch_overwrites_earlier_one() {
        let f = fixture();
        let user = UserId::new();
        let first = f
            .registry
            .set_user_revocation_epoch(user, Duration::from_secs(3600))
            .await
            .unwrap();
        f.clock.advance(chrono::Duration::seconds(10));
        let second = f
            .registry
            .set_user_revocation_epoch(user, Duration::from_secs(3600))
            .await
            .unwrap();
        assert!(second > first);
        assert_eq!(f.registry.get_user_revocation_epoch(user).await.unwrap(), Some(second));
    }
}
