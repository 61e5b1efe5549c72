use super::AuthError;
use crate::domain_model::*;

/// Signs and checks access/refresh tokens. Pure: no I/O, no shared state.
pub trait TokenCodec: Send + Sync {
    fn issue(&self, user: UserId) -> Result<TokenPair, AuthError>;
    fn verify_access(&self, token: &AccessToken) -> Result<UserId, AuthError>;
    fn verify_refresh(&self, token: &RefreshToken) -> Result<UserId, AuthError>;
}

#[async_trait::async_trait]
pub trait SessionService: Send + Sync {
    /// Issue and persist the first pair for a freshly registered subject.
    async fn issue_for_new_subject(&self, user: UserId) -> Result<TokenPair, AuthError>;
    /// Issue and persist a pair after a successful password check, replacing any prior session.
    async fn issue_for_authenticated_subject(&self, user: UserId)
    -> Result<TokenPair, AuthError>;
    /// Exchange the refresh token on record for a new pair.
    ///
    /// Fails with [`AuthError::InvalidToken`] when the token does not verify and with
    /// [`AuthError::Unauthorized`] when it verifies but is not the one currently stored.
    async fn rotate(&self, refresh_token: &RefreshToken) -> Result<(UserId, TokenPair), AuthError>;
    fn verify_access(&self, token: &AccessToken) -> Result<UserId, AuthError>;
}
