use super::util::{is_dup_key, store_err, uuid_from_bytes};
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};

pub struct MySqlIdentityRepo {
    pool: MySqlPool,
}

impl MySqlIdentityRepo {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlIdentityRepo { pool }
    }

    fn row_to_identity(row: MySqlRow) -> Result<Identity, AuthError> {
        let id_bytes: Vec<u8> = row.try_get("id").map_err(store_err)?;
        let email: String = row.try_get("email").map_err(store_err)?;
        let password_hash: String = row.try_get("password_hash").map_err(store_err)?;
        let name: String = row.try_get("name").map_err(store_err)?;
        let created_at: DateTime<Utc> = row.try_get("created_at").map_err(store_err)?;

        Ok(Identity {
            id: UserId(uuid_from_bytes(&id_bytes)?),
            email,
            password_hash,
            name,
            created_at,
        })
    }
}

#[async_trait::async_trait]
impl IdentityRepo for MySqlIdentityRepo {
    async fn create(&self, identity: &Identity) -> Result<(), AuthError> {
        sqlx::query(
            r#"
INSERT INTO user_identity (id, email, password_hash, name, created_at)
VALUES (?, ?, ?, ?, ?)
"#,
        )
        .bind(identity.id.0.as_bytes().as_slice())
        .bind(&identity.email)
        .bind(&identity.password_hash)
        .bind(&identity.name)
        .bind(identity.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if is_dup_key(&e) {
                AuthError::UserExists
            } else {
                store_err(e)
            }
        })?;

        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, AuthError> {
        let row_opt: Option<MySqlRow> = sqlx::query(
            r#"
SELECT id, email, password_hash, name, created_at
FROM user_identity
WHERE email = ?
"#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        row_opt.map(Self::row_to_identity).transpose()
    }

    async fn find_by_id(&self, user_id: UserId) -> Result<Option<Identity>, AuthError> {
        let row_opt: Option<MySqlRow> = sqlx::query(
            r#"
SELECT id, email, password_hash, name, created_at
FROM user_identity
WHERE id = ?
"#,
        )
        .bind(user_id.0.as_bytes().as_slice())
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        row_opt.map(Self::row_to_identity).transpose()
    }

    async fn update_password_hash(
        &self,
        user_id: UserId,
        password_hash: &str,
    ) -> Result<bool, AuthError> {
        let result = sqlx::query("UPDATE user_identity SET password_hash = ? WHERE id = ?")
            .bind(password_hash)
            .bind(user_id.0.as_bytes().as_slice())
            .execute(&self.pool)
            .await
            .map_err(store_err)?;

        Ok(result.rows_affected() > 0)
    }
}
