use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct RealSessionService {
    token_codec: Arc<dyn TokenCodec>,
    token_store: Arc<dyn TokenStore>,
}

impl RealSessionService {
    pub fn new(token_codec: Arc<dyn TokenCodec>, token_store: Arc<dyn TokenStore>) -> Self {
        Self {
            token_codec,
            token_store,
        }
    }

    async fn issue(&self, user_id: UserId) -> Result<TokenPair, AuthError> {
        let pair = self.token_codec.issue(user_id)?;
        self.token_store
            .save(user_id, &pair.refresh_token, pair.refresh_expires_at)
            .await?;
        Ok(pair)
    }

    /// A verified token is only trusted if it is, literally, the one on record for its subject.
    fn is_on_record(
        user_id: UserId,
        presented: &RefreshToken,
        record: Option<&PersistedRefreshToken>,
    ) -> bool {
        matches!(record, Some(r) if r.user_id == user_id && r.token == *presented)
    }
}

#[async_trait::async_trait]
impl SessionService for RealSessionService {
    async fn issue_for_new_subject(&self, user_id: UserId) -> Result<TokenPair, AuthError> {
        let pair = self.issue(user_id).await?;
        debug!(%user_id, "issued first session");
        Ok(pair)
    }

    async fn issue_for_authenticated_subject(
        &self,
        user_id: UserId,
    ) -> Result<TokenPair, AuthError> {
        let pair = self.issue(user_id).await?;
        debug!(%user_id, "issued session, prior refresh token superseded");
        Ok(pair)
    }

    async fn rotate(&self, presented: &RefreshToken) -> Result<(UserId, TokenPair), AuthError> {
        let user_id = self.token_codec.verify_refresh(presented)?;

        let record = self.token_store.find_by_token(presented).await?;
        if !Self::is_on_record(user_id, presented, record.as_ref()) {
            warn!(%user_id, "refresh rejected: token is not the one on record");
            return Err(AuthError::Unauthorized);
        }

        let pair = self.token_codec.issue(user_id)?;
        let replaced = self
            .token_store
            .replace(
                user_id,
                presented,
                &pair.refresh_token,
                pair.refresh_expires_at,
            )
            .await?;
        if !replaced {
            warn!(%user_id, "refresh rejected: lost a concurrent rotation");
            return Err(AuthError::Unauthorized);
        }

        info!(%user_id, "refresh token rotated");
        Ok((user_id, pair))
    }

    fn verify_access(&self, token: &AccessToken) -> Result<UserId, AuthError> {
        self.token_codec.verify_access(token)
    }
}
