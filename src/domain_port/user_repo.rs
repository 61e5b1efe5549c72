use crate::application_port::*;
use crate::domain_model::*;

#[async_trait::async_trait]
pub trait UserRepo: Send + Sync {
    /// Insert a user. Fails with [`AuthError::EmailExists`] if the email is taken.
    async fn create(
        &self,
        user_id: UserId,
        email: &str,
        password_hash: &str,
    ) -> Result<(), AuthError>;

    /// Remove a user. Deleting an unknown id is not an error.
    async fn delete(&self, user_id: UserId) -> Result<(), AuthError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, AuthError>;

    async fn email_exists(&self, email: &str) -> Result<bool, AuthError>;
}
