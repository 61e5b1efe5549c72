use crate::application_port::*;
use crate::domain_model::*;
use chrono::{DateTime, Utc};

/// Holds at most one refresh token per subject.
///
/// Every write is atomic per subject: a reader never observes a half-replaced
/// record, and the lookup-by-token index never points a stale token at a live record.
#[async_trait::async_trait]
pub trait TokenStore: Send + Sync {
    /// Upsert the record for `user_id`, discarding whatever was there.
    async fn save(
        &self,
        user_id: UserId,
        token: &RefreshToken,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AuthError>;

    /// Replace the record for `user_id` only if it still holds `expected`.
    /// Returns `false` when another writer got there first or no record exists.
    async fn replace(
        &self,
        user_id: UserId,
        expected: &RefreshToken,
        token: &RefreshToken,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, AuthError>;

    async fn find_by_subject(
        &self,
        user_id: UserId,
    ) -> Result<Option<PersistedRefreshToken>, AuthError>;

    /// Exact-match lookup of the raw token string.
    async fn find_by_token(
        &self,
        token: &RefreshToken,
    ) -> Result<Option<PersistedRefreshToken>, AuthError>;
}

/// Index key for a raw token. Stores never index by the token itself.
pub fn token_digest(token: &RefreshToken) -> String {
    use sha2::{Digest, Sha256};
    let digest = Sha256::digest(token.as_str().as_bytes());
    hex::encode(&digest[..])
}
