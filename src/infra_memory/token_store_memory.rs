use crate::application_port::*;
use crate::domain_model::*;
use crate::domain_port::*;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

/// Process-local [`TokenStore`].
///
/// `records` is the source of truth and every write to a subject happens under that
/// subject's shard lock. `by_digest` is only an index: lookups always confirm the hit
/// against `records`, so an index entry left behind by a replaced token never matches.
#[derive(Default)]
pub struct MemoryTokenStore {
    records: DashMap<UserId, PersistedRefreshToken>,
    by_digest: DashMap<String, UserId>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
            by_digest: DashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn record(
        user_id: UserId,
        token: &RefreshToken,
        expires_at: DateTime<Utc>,
    ) -> PersistedRefreshToken {
        PersistedRefreshToken {
            user_id,
            token: token.clone(),
            expires_at,
        }
    }
}

#[async_trait::async_trait]
impl TokenStore for MemoryTokenStore {
    async fn save(
        &self,
        user_id: UserId,
        token: &RefreshToken,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        self.by_digest.insert(token_digest(token), user_id);
        if let Some(old) = self
            .records
            .insert(user_id, Self::record(user_id, token, expires_at))
        {
            if old.token != *token {
                self.by_digest.remove(&token_digest(&old.token));
            }
        }
        Ok(())
    }

    async fn replace(
        &self,
        user_id: UserId,
        expected: &RefreshToken,
        token: &RefreshToken,
        expires_at: DateTime<Utc>,
    ) -> Result<bool, AuthError> {
        let Some(mut current) = self.records.get_mut(&user_id) else {
            return Ok(false);
        };
        if current.token != *expected {
            return Ok(false);
        }

        self.by_digest.insert(token_digest(token), user_id);
        *current = Self::record(user_id, token, expires_at);
        drop(current);
        if expected != token {
            self.by_digest.remove(&token_digest(expected));
        }
        Ok(true)
    }

    async fn find_by_subject(
        &self,
        user_id: UserId,
    ) -> Result<Option<PersistedRefreshToken>, AuthError> {
        Ok(self.records.get(&user_id).map(|r| r.value().clone()))
    }

    async fn find_by_token(
        &self,
        token: &RefreshToken,
    ) -> Result<Option<PersistedRefreshToken>, AuthError> {
        let Some(user_id) = self.by_digest.get(&token_digest(token)).map(|r| *r.value()) else {
            return Ok(None);
        };
        Ok(self
            .records
            .get(&user_id)
            .filter(|r| r.token == *token)
            .map(|r| r.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn token(s: &str) -> RefreshToken {
        RefreshToken(s.to_string())
    }

    #[tokio::test]
    async fn save_keeps_one_record_per_subject() {
        let store = MemoryTokenStore::new();
        let user = UserId::new_v4();
        let exp = Utc::now();

        store.save(user, &token("r1"), exp).await.unwrap();
        store.save(user, &token("r2"), exp).await.unwrap();

        assert_eq!(store.len(), 1);
        let rec = store.find_by_subject(user).await.unwrap().unwrap();
        assert_eq!(rec.token, token("r2"));
        assert!(store.find_by_token(&token("r1")).await.unwrap().is_none());
        assert_eq!(
            store.find_by_token(&token("r2")).await.unwrap().unwrap().user_id,
            user
        );
    }

    #[tokio::test]
    async fn replace_is_compare_and_swap() {
        let store = MemoryTokenStore::new();
        let user = UserId::new_v4();
        let exp = Utc::now();

        assert!(!store.replace(user, &token("r1"), &token("r2"), exp).await.unwrap());

        store.save(user, &token("r1"), exp).await.unwrap();
        assert!(!store.replace(user, &token("stale"), &token("r2"), exp).await.unwrap());
        assert!(store.replace(user, &token("r1"), &token("r2"), exp).await.unwrap());
        assert!(!store.replace(user, &token("r1"), &token("r3"), exp).await.unwrap());

        let rec = store.find_by_subject(user).await.unwrap().unwrap();
        assert_eq!(rec.token, token("r2"));
        assert!(store.find_by_token(&token("r1")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn subjects_do_not_interfere() {
        let store = MemoryTokenStore::new();
        let (a, b) = (UserId::new_v4(), UserId::new_v4());
        let exp = Utc::now();

        store.save(a, &token("ra"), exp).await.unwrap();
        store.save(b, &token("rb"), exp).await.unwrap();
        store.save(a, &token("ra2"), exp).await.unwrap();

        assert_eq!(
            store.find_by_subject(b).await.unwrap().unwrap().token,
            token("rb")
        );
        assert_eq!(store.find_by_token(&token("rb")).await.unwrap().unwrap().user_id, b);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_replace_has_one_winner() {
        let store = Arc::new(MemoryTokenStore::new());
        let user = UserId::new_v4();
        let exp = Utc::now();
        store.save(user, &token("r0"), exp).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..16 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .replace(user, &token("r0"), &token(&format!("next-{i}")), exp)
                    .await
                    .unwrap()
            }));
        }

        let mut wins = 0;
        for handle in handles {
            if handle.await.unwrap() {
                wins += 1;
            }
        }
        assert_eq!(wins, 1);
    }
}
