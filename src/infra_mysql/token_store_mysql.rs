use super::util::*;
use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use sqlx::mysql::MySqlRow;
use sqlx::{MySqlPool, Row};

/// `refresh_token` is keyed by `user_id`, so the table itself enforces one record per
/// subject. `token_hash` is unique and indexed for lookup by raw token.
pub struct MySqlTokenStore {
    pool: MySqlPool,
}

impl MySqlTokenStore {
    pub fn new(pool: MySqlPool) -> Self {
        MySqlTokenStore { pool }
    }

    fn row_to_record(row: MySqlRow) -> Result<PersistedRefreshToken, AuthError> {
        let user_id_bytes: Vec<u8> = row.try_get("user_id").map_err(store_err)?;
        let token: String = row.try_get("token").map_err(store_err)?;
        let expires_at: DateTime<Utc> = row.try_get("expires_at").map_err(store_err)?;

        Ok(PersistedRefreshToken {
            user_id: uid_from_bytes(&user_id_bytes)?,
            token: RefreshToken(token),
            expires_at,
        })
    }
}

#[async_trait::async_trait]
impl TokenStore for MySqlTokenStore {
    async fn save(
        &self,
        user_id: UserId,
        token: &RefreshToken,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        sqlx::query(
            r#"
INSERT INTO refresh_token (user_id, token, token_hash, expires_at)
VALUES (?, ?, ?, ?)
ON DUPLICATE KEY UPDATE
    token = VALUES(token),
    token_hash = VALUES(token_hash),
    expires_at = VALUES(expires_at)
"#,
        )
        .bind(uid_as_bytes(&user_id))
        .bind(token.as_str())
        .bind(token_digest(token))
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(())
    }

    async fn replace(
        &self,
        user_id: UserId,
        expected: &RefreshToken,
        token: &RefreshToken,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, AuthError> {
        let result = sqlx::query(
            r#"
UPDATE refresh_token
SET token = ?, token_hash = ?, expires_at = ?
WHERE user_id = ? AND token_hash = ?
"#,
        )
        .bind(token.as_str())
        .bind(token_digest(token))
        .bind(expires_at)
        .bind(uid_as_bytes(&user_id))
        .bind(token_digest(expected))
        .execute(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(result.rows_affected() == 1)
    }

    async fn find_by_subject(
        &self,
        user_id: UserId,
    ) -> Result<Option<PersistedRefreshToken>, AuthError> {
        let row_opt: Option<MySqlRow> = sqlx::query(
            r#"
SELECT user_id, token, expires_at
FROM refresh_token
WHERE user_id = ?
"#,
        )
        .bind(uid_as_bytes(&user_id))
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        row_opt.map(Self::row_to_record).transpose()
    }

    async fn find_by_token(
        &self,
        token: &RefreshToken,
    ) -> Result<Option<PersistedRefreshToken>, AuthError> {
        let row_opt: Option<MySqlRow> = sqlx::query(
            r#"
SELECT user_id, token, expires_at
FROM refresh_token
WHERE token_hash = ?
"#,
        )
        .bind(token_digest(token))
        .fetch_optional(&self.pool)
        .await
        .map_err(store_err)?;

        Ok(row_opt
            .map(Self::row_to_record)
            .transpose()?
            .filter(|rec| rec.token == *token))
    }
}
