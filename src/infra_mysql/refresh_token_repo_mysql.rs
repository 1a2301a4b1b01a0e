use super::util::{store_err, uuid_from_bytes};
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};

/// State transitions are single conditional `UPDATE`s; `rows_affected`
/// tells the caller whether it won.
pub struct MySqlRefreshTokenRepo {
    pool: MySqlPool,
}

const SELECT_COLUMNS: &str = r#"
SELECT id, owner_id, token_hash, issued_at, expires_at, revoked_at,
       replaced_by, grace_token_hash, grace_ends_at
FROM refresh_token
"#;

impl MySqlRefreshTokenRepo {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlRefreshTokenRepo { pool }
    }

    #[inline]
    fn id_bytes(id: &RefreshRecordId) -> &[u8] {
        id.0.as_bytes()
    }

    fn row_to_record(row: MySqlRow) -> Result<RefreshTokenRecord, AuthError> {
        let id: Vec<u8> = row.try_get("id").map_err(store_err)?;
        let owner: Vec<u8> = row.try_get("owner_id").map_err(store_err)?;
        let token_hash: String = row.try_get("token_hash").map_err(store_err)?;
        let issued_at: DateTime<Utc> = row.try_get("issued_at").map_err(store_err)?;
        let expires_at: DateTime<Utc> = row.try_get("expires_at").map_err(store_err)?;
        let revoked_at: Option<DateTime<Utc>> = row.try_get("revoked_at").map_err(store_err)?;
        let replaced_by: Option<Vec<u8>> = row.try_get("replaced_by").map_err(store_err)?;
        let grace_token_hash: Option<String> =
            row.try_get("grace_token_hash").map_err(store_err)?;
        let grace_ends_at: Option<DateTime<Utc>> =
            row.try_get("grace_ends_at").map_err(store_err)?;

        Ok(RefreshTokenRecord {
            id: RefreshRecordId(uuid_from_bytes(&id)?),
            owner: UserId(uuid_from_bytes(&owner)?),
            token_hash: TokenDigest::from_hex(token_hash),
            issued_at,
            expires_at,
            revoked_at,
            replaced_by: replaced_by
                .map(|bytes| uuid_from_bytes(&bytes).map(RefreshRecordId))
                .transpose()?,
            grace_period_token_hash: grace_token_hash.map(TokenDigest::from_hex),
            grace_period_ends_at: grace_ends_at,
        })
    }
}

#[async_trait::async_trait]
impl RefreshTokenRepo for MySqlRefreshTokenRepo {
    async fn insert(&self, record: &RefreshTokenRecord) -> Result<(), AuthError> {
        sqlx::query(
            r#"
INSERT INTO refresh_token (id, owner_id, token_hash, issued_at, expires_at)
VALUES (?, ?, ?, ?, ?)
"#,
        )
        .bind(Self::id_bytes(&record.id))
        .bind(record.owner.0.as_bytes().as_slice())
        .bind(record.token_hash.as_str())
        .bind(record.issued_at)
        .bind(record.expires_at)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(())
    }

    async fn find_by_hash(
        &self,
        token_hash: &TokenDigest,
    ) -> Result<Option<RefreshTokenRecord>, AuthError> {
        let sql = format!("{SELECT_COLUMNS} WHERE token_hash = ?");
        let row_opt = sqlx::query(&sql)
            .bind(token_hash.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;

        row_opt.map(Self::row_to_record).transpose()
    }

    async fn find_by_id(
        &self,
        id: RefreshRecordId,
    ) -> Result<Option<RefreshTokenRecord>, AuthError> {
        let sql = format!("{SELECT_COLUMNS} WHERE id = ?");
        let row_opt = sqlx::query(&sql)
            .bind(Self::id_bytes(&id))
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;

        row_opt.map(Self::row_to_record).transpose()
    }

    async fn revoke_if_active(
        &self,
        id: RefreshRecordId,
        replaced_by: Option<RefreshRecordId>,
        revoked_at: DateTime<Utc>,
    ) -> Result<bool, AuthError> {
        let result = sqlx::query(
            r#"
UPDATE refresh_token
SET revoked_at = ?, replaced_by = COALESCE(?, replaced_by)
WHERE id = ? AND revoked_at IS NULL
"#,
        )
        .bind(revoked_at)
        .bind(replaced_by.map(|r| r.0.as_bytes().to_vec()))
        .bind(Self::id_bytes(&id))
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(result.rows_affected() == 1)
    }

    async fn attach_grace_if_unset(
        &self,
        id: RefreshRecordId,
        replaced_by: RefreshRecordId,
        grace_token_hash: &TokenDigest,
        grace_ends_at: DateTime<Utc>,
    ) -> Result<bool, AuthError> {
        let result = sqlx::query(
            r#"
UPDATE refresh_token
SET replaced_by = ?, grace_token_hash = ?, grace_ends_at = ?
WHERE id = ? AND revoked_at IS NULL AND grace_token_hash IS NULL
"#,
        )
        .bind(Self::id_bytes(&replaced_by))
        .bind(grace_token_hash.as_str())
        .bind(grace_ends_at)
        .bind(Self::id_bytes(&id))
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(result.rows_affected() == 1)
    }

    async fn revoke_all_for_user(
        &self,
        owner: UserId,
        revoked_at: DateTime<Utc>,
    ) -> Result<u64, AuthError> {
        let result = sqlx::query(
            r#"
UPDATE refresh_token
SET revoked_at = ?
WHERE owner_id = ? AND revoked_at IS NULL
"#,
        )
        .bind(revoked_at)
        .bind(owner.0.as_bytes().as_slice())
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(result.rows_affected())
    }

    async fn delete_expired(&self, before: DateTime<Utc>, limit: u32) -> Result<u64, AuthError> {
        let result = sqlx::query("DELETE FROM refresh_token WHERE expires_at <= ? LIMIT ?")
            .bind(before)
            .bind(limit)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;

        Ok(result.rows_affected())
    }
}
