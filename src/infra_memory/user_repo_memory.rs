use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::Utc;
use dashmap::DashMap;

#[derive(Default)]
pub struct MemoryUserRepo {
    users: DashMap<String, UserRecord>,
}

impl MemoryUserRepo {
    pub fn new() -> Self {
        Self {
            users: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait::async_trait]
impl UserRepo for MemoryUserRepo {
    async fn create(
        &self,
        user_id: UserId,
        email: &str,
        password_hash: &str,
    ) -> Result<(), AuthError> {
        let mut created = false;
        // Shard lock makes check-and-insert one step.
        self.users.entry(email.to_string()).or_insert_with(|| {
            created = true;
            UserRecord {
                user_id,
                email: email.to_string(),
                password_hash: password_hash.to_string(),
                created_at: Utc::now(),
            }
        });

        if created {
            Ok(())
        } else {
            Err(AuthError::EmailExists)
        }
    }

    async fn delete(&self, user_id: UserId) -> Result<(), AuthError> {
        self.users.retain(|_, rec| rec.user_id != user_id);
        Ok(())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, AuthError> {
        Ok(self.users.get(email).map(|r| r.value().clone()))
    }

    async fn email_exists(&self, email: &str) -> Result<bool, AuthError> {
        Ok(self.users.contains_key(email))
    }
}
