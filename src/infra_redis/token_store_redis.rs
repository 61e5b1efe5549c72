use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, TimeZone, Utc};
use redis::aio::ConnectionManager;
use redis::{
    AsyncCommands, FromRedisValue, RedisError, RedisResult, RedisWrite, Script, ToRedisArgs,
    Value,
};

const REFRESH_TOKEN_UPSERT: &str = include_str!("refresh_token_upsert.lua");

const SAVE_ATTEMPTS: usize = 5;

/// Layout under `prefix`:
/// - `{prefix}:sub:{user_id}` hash of `token`, `digest`, `exp`
/// - `{prefix}:tok:{digest}` the owning user id
///
/// Both keys expire with the refresh token and are only written by one Lua script,
/// so a subject's record and its index change together. The script touches keys in
/// different hash slots, which limits this store to a single Redis node.
pub struct RedisTokenStore {
    conn: ConnectionManager,
    prefix: String,
    upsert: Script,
}

enum Upsert {
    Written,
    Mismatch,
    Stale,
}

/// Keys for one script call: subject hash, new index entry, observed index entry.
fn script_keys(
    prefix: &str,
    user_id: UserId,
    new_digest: &str,
    observed_digest: Option<&str>,
) -> [String; 3] {
    let index = |digest: &str| format!("{prefix}:tok:{digest}");
    [
        format!("{prefix}:sub:{user_id}"),
        index(new_digest),
        index(observed_digest.unwrap_or(new_digest)),
    ]
}

impl RedisTokenStore {
    pub fn new(conn: ConnectionManager, prefix: impl Into<String>) -> Self {
        RedisTokenStore {
            conn,
            prefix: prefix.into(),
            upsert: Script::new(REFRESH_TOKEN_UPSERT),
        }
    }

    fn subject_key(&self, user_id: UserId) -> String {
        format!("{}:sub:{}", self.prefix, user_id)
    }

    fn token_key(&self, digest: &str) -> String {
        format!("{}:tok:{}", self.prefix, digest)
    }

    fn ttl_secs(until: DateTime<Utc>) -> i64 {
        let secs = (until - Utc::now()).num_seconds();
        if secs <= 0 { 1 } else { secs }
    }

    async fn current_digest(&self, user_id: UserId) -> Result<Option<String>, AuthError> {
        let mut conn = self.conn.clone();
        conn.hget(self.subject_key(user_id), "digest")
            .await
            .map_err(|e| AuthError::StoreUnavailable(e.to_string()))
    }

    async fn write(
        &self,
        user_id: UserId,
        token: &RefreshToken,
        expires_at: DateTime<Utc>,
        observed_digest: Option<&str>,
        compare_and_swap: bool,
    ) -> Result<Upsert, AuthError> {
        let mut conn = self.conn.clone();
        let digest = token_digest(token);
        let [subject, new_index, observed_index] =
            script_keys(&self.prefix, user_id, &digest, observed_digest);
        let outcome: i64 = self
            .upsert
            .key(subject)
            .key(new_index)
            .key(observed_index)
            .arg(token.as_str())
            .arg(&digest)
            .arg(&user_id)
            .arg(expires_at.timestamp())
            .arg(Self::ttl_secs(expires_at))
            .arg(observed_digest.unwrap_or_default())
            .arg(if compare_and_swap { "1" } else { "0" })
            .invoke_async(&mut conn)
            .await
            .map_err(|e| AuthError::StoreUnavailable(e.to_string()))?;
        Ok(match outcome {
            1 => Upsert::Written,
            0 => Upsert::Mismatch,
            _ => Upsert::Stale,
        })
    }

    async fn read_subject(
        &self,
        user_id: UserId,
    ) -> Result<Option<PersistedRefreshToken>, AuthError> {
        let mut conn = self.conn.clone();
        let (token, exp): (Option<String>, Option<i64>) = redis::cmd("HMGET")
            .arg(self.subject_key(user_id))
            .arg("token")
            .arg("exp")
            .query_async(&mut conn)
            .await
            .map_err(|e| AuthError::StoreUnavailable(e.to_string()))?;

        let (Some(token), Some(exp)) = (token, exp) else {
            return Ok(None);
        };
        let expires_at = Utc
            .timestamp_opt(exp, 0)
            .single()
            .ok_or_else(|| AuthError::StoreUnavailable(format!("bad expiry {exp}")))?;

        Ok(Some(PersistedRefreshToken {
            user_id,
            token: RefreshToken(token),
            expires_at,
        }))
    }
}

impl ToRedisArgs for UserId {
    fn write_redis_args<W>(&self, out: &mut W)
    where
        W: ?Sized + RedisWrite,
    {
        out.write_arg(self.to_string().as_bytes())
    }
}

impl FromRedisValue for UserId {
    fn from_redis_value(v: &Value) -> RedisResult<Self> {
        let s: String = redis::from_redis_value(v)?;
        let user_id = s.parse::<UserId>().map_err(|e| {
            RedisError::from((
                redis::ErrorKind::TypeError,
                "invalid UserId string",
                e.to_string(),
            ))
        })?;
        Ok(user_id)
    }
}

#[async_trait::async_trait]
impl TokenStore for RedisTokenStore {
    async fn save(
        &self,
        user_id: UserId,
        token: &RefreshToken,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        // The index entry to drop is named by the caller, so read it first and retry
        // if the record moved in between.
        for _ in 0..SAVE_ATTEMPTS {
            let observed = self.current_digest(user_id).await?;
            match self
                .write(user_id, token, expires_at, observed.as_deref(), false)
                .await?
            {
                Upsert::Written => return Ok(()),
                Upsert::Mismatch | Upsert::Stale => continue,
            }
        }
        Err(AuthError::StoreUnavailable(format!(
            "refresh token for {user_id} kept changing during save"
        )))
    }

    async fn replace(
        &self,
        user_id: UserId,
        expected: &RefreshToken,
        token: &RefreshToken,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, AuthError> {
        let expected_digest = token_digest(expected);
        let outcome = self
            .write(user_id, token, expires_at, Some(expected_digest.as_str()), true)
            .await?;
        Ok(matches!(outcome, Upsert::Written))
    }

    async fn find_by_subject(
        &self,
        user_id: UserId,
    ) -> Result<Option<PersistedRefreshToken>, AuthError> {
        self.read_subject(user_id).await
    }

    async fn find_by_token(
        &self,
        token: &RefreshToken,
    ) -> Result<Option<PersistedRefreshToken>, AuthError> {
        let key = self.token_key(&token_digest(token));
        let mut conn = self.conn.clone();
        let owner: Option<UserId> = conn
            .get(&key)
            .await
            .map_err(|e| AuthError::StoreUnavailable(e.to_string()))?;

        let Some(user_id) = owner else {
            return Ok(None);
        };
        Ok(self
            .read_subject(user_id)
            .await?
            .filter(|rec| rec.token == *token))
    }
}
