use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use std::sync::Arc;
use tracing::{error, info};

pub struct RealAuthService {
    user_repo: Arc<dyn UserRepo>,
    credential_hasher: Arc<dyn CredentialHasher>,
    session_service: Arc<dyn SessionService>,
}

impl RealAuthService {
    pub fn new(
        user_repo: Arc<dyn UserRepo>,
        credential_hasher: Arc<dyn CredentialHasher>,
        session_service: Arc<dyn SessionService>,
    ) -> Self {
        Self {
            user_repo,
            credential_hasher,
            session_service,
        }
    }
}

#[async_trait::async_trait]
impl AuthService for RealAuthService {
    async fn sign_up(&self, request: SignUpInput) -> Result<AuthSession, AuthError> {
        let SignUpInput { email, password } = request;

        if self.user_repo.email_exists(&email).await? {
            return Err(AuthError::EmailExists);
        }

        let password_hash = self.credential_hasher.hash_password(&password).await?;
        let user_id = UserId::new_v4();
        // The repo still rejects a duplicate that raced past the check above.
        self.user_repo
            .create(user_id, &email, &password_hash)
            .await?;

        let tokens = match self.session_service.issue_for_new_subject(user_id).await {
            Ok(tokens) => tokens,
            Err(e) => {
                // No account without a session: undo the insert so the email stays free.
                if let Err(undo) = self.user_repo.delete(user_id).await {
                    error!(%user_id, %undo, "sign-up rollback failed");
                }
                return Err(e);
            }
        };
        info!(%user_id, "user signed up");

        Ok(AuthSession { tokens, user_id })
    }

    async fn sign_in(&self, request: SignInInput) -> Result<AuthSession, AuthError> {
        let SignInInput { email, password } = request;

        let rec = self
            .user_repo
            .find_by_email(&email)
            .await?
            .ok_or(AuthError::EmailNotFound)?;

        let ok = self
            .credential_hasher
            .verify_password(&password, &rec.password_hash)
            .await?;
        if !ok {
            return Err(AuthError::InvalidPassword);
        }

        let tokens = self
            .session_service
            .issue_for_authenticated_subject(rec.user_id)
            .await?;
        info!(user_id = %rec.user_id, "user signed in");

        Ok(AuthSession {
            tokens,
            user_id: rec.user_id,
        })
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, AuthError> {
        let (user_id, tokens) = self
            .session_service
            .rotate(&RefreshToken(refresh_token.to_string()))
            .await?;
        Ok(AuthSession { tokens, user_id })
    }

    async fn verify_token(&self, access_token: &str) -> Result<UserId, AuthError> {
        self.session_service
            .verify_access(&AccessToken(access_token.to_string()))
    }
}
