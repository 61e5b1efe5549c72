use crate::domain_model::*;
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("email already registered")]
    EmailExists,
    #[error("email not found")]
    EmailNotFound,
    #[error("invalid password")]
    InvalidPassword,
    #[error("token invalid")]
    InvalidToken,
    #[error("unauthorized")]
    Unauthorized,
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Clone)]
pub struct SignUpInput {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct SignInInput {
    pub email: String,
    pub password: String,
}

/// What every successful sign-up, sign-in and refresh hands back to the client.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    #[serde(flatten)]
    pub tokens: TokenPair,
    pub user_id: UserId,
}

#[async_trait::async_trait]
pub trait CredentialHasher: Send + Sync {
    async fn hash_password(&self, password: &str) -> Result<String, AuthError>;
    async fn verify_password(&self, password: &str, password_hash: &str)
    -> Result<bool, AuthError>;
}

#[async_trait::async_trait]
pub trait AuthService: Send + Sync {
    async fn sign_up(&self, request: SignUpInput) -> Result<AuthSession, AuthError>;
    async fn sign_in(&self, request: SignInInput) -> Result<AuthSession, AuthError>;
    async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, AuthError>;
    async fn verify_token(&self, access_token: &str) -> Result<UserId, AuthError>;
}
