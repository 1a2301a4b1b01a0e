use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use std::time::Duration;

// KEYS[1] epoch key, ARGV[1] epoch micros, ARGV[2] ttl seconds.
// The epoch is written back as the original string: Lua would print a
// 16 digit number in exponent form.
const PUT_EPOCH_SCRIPT: &str = r#"
local epoch = ARGV[1]
local ttl = tonumber(ARGV[2])
local current = redis.call('GET', KEYS[1])
if current then
  local remaining = redis.call('TTL', KEYS[1])
  if tonumber(current) > tonumber(epoch) then epoch = current end
  if remaining > ttl then ttl = remaining end
end
redis.call('SET', KEYS[1], epoch, 'EX', ttl)
return ttl
"#;

/// Blacklist and epoch entries as plain keys with `SET EX` expiry:
/// `{prefix}:bl:{digest}` and `{prefix}:epoch:{user_id}`.
pub struct RedisRevocationStore {
    conn: ConnectionManager,
    prefix: String,
    put_epoch: Script,
}

impl RedisRevocationStore {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        RedisRevocationStore {
            conn,
            prefix: prefix.into(),
            put_epoch: Script::new(PUT_EPOCH_SCRIPT),
        }
    }

    fn blacklist_key(&self, token_hash: &TokenDigest) -> String {
        format!("{}:bl:{}", self.prefix, token_hash)
    }

    fn epoch_key(&self, user_id: UserId) -> String {
        format!("{}:epoch:{}", self.prefix, user_id)
    }

    #[inline]
    fn ttl_secs(ttl: Duration) -> u64 {
        ttl.as_secs().max(1)
    }
}

#[async_trait::async_trait]
impl RevocationStore for RedisRevocationStore {
    async fn put_blacklisted(
        &self,
        token_hash: &TokenDigest,
        ttl: Duration,
    ) -> Result<(), AuthError> {
        let key = self.blacklist_key(token_hash);
        let mut conn = self.conn.clone();
        let _: () = conn
            .set_ex(&key, 1u8, Self::ttl_secs(ttl))
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?;
        Ok(())
    }

    async fn is_blacklisted(&self, token_hash: &TokenDigest) -> Result<bool, AuthError> {
        let key = self.blacklist_key(token_hash);
        let mut conn = self.conn.clone();
        let found: bool = conn
            .exists(&key)
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?;
        Ok(found)
    }

    async fn put_user_epoch(
        &self,
        user_id: UserId,
        epoch_micros: i64,
        ttl: Duration,
    ) -> Result<(), AuthError> {
        let key = self.epoch_key(user_id);
        let mut conn = self.conn.clone();
        let _kept_ttl: i64 = self
            .put_epoch
            .key(&key)
            .arg(epoch_micros)
            .arg(Self::ttl_secs(ttl))
            .invoke_async(&mut conn)
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?;
        Ok(())
    }

    async fn get_user_epoch(&self, user_id: UserId) -> Result<Option<i64>, AuthError> {
        let key = self.epoch_key(user_id);
        let mut conn = self.conn.clone();
        let epoch: Option<i64> = conn
            .get(&key)
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?;
        Ok(epoch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sub_second_ttls_round_up_to_one() {
        assert_eq!(RedisRevocationStore::ttl_secs(Duration::from_millis(10)), 1);
        assert_eq!(RedisRevocationStore::ttl_secs(Duration::from_secs(900)), 900);
    }
}
