use crate::application_impl::*;
use crate::application_port::*;
use crate::domain_port::*;
use crate::infra_memory::*;
use crate::infra_mysql::*;
use crate::infra_redis::*;
use crate::logger::*;
use crate::settings::{Settings, Store};
use anyhow::{Context, anyhow};
use sqlx::{MySql, Pool};
use std::sync::Arc;
use std::time::Duration;

pub struct Server {
    pub auth_service: Arc<dyn AuthService>,
    pool: Option<Pool<MySql>>,
}

impl Server {
    pub async fn try_new(settings: &Settings) -> anyhow::Result<Self> {
        let store = &settings.store;
        check_backends(store)?;

        let needs_mysql = store.token_backend == "mysql" || store.user_backend == "mysql";
        let pool = if needs_mysql {
            let dsn = store
                .mysql_dsn
                .as_deref()
                .ok_or_else(|| anyhow!("store.mysql_dsn is required for the mysql backend"))?;
            Some(
                Pool::<MySql>::connect(dsn)
                    .await
                    .context("connecting to mysql")?,
            )
        } else {
            None
        };

        let token_store: Arc<dyn TokenStore> = match store.token_backend.as_str() {
            "memory" => Arc::new(MemoryTokenStore::new()),
            "mysql" => Arc::new(MySqlTokenStore::new(mysql_pool(&pool)?)),
            "redis" => {
                let dsn = store
                    .redis_dsn
                    .as_deref()
                    .ok_or_else(|| anyhow!("store.redis_dsn is required for the redis backend"))?;
                let redis_client = redis::Client::open(dsn)?;
                let redis_manager = redis_client
                    .get_connection_manager()
                    .await
                    .context("connecting to redis")?;
                Arc::new(RedisTokenStore::new(
                    redis_manager,
                    store.redis_prefix.clone(),
                ))
            }
            other => return Err(anyhow!("Unknown token store backend: {}", other)),
        };

        let user_repo: Arc<dyn UserRepo> = match store.user_backend.as_str() {
            "memory" => Arc::new(MemoryUserRepo::new()),
            "mysql" => Arc::new(MySqlUserRepo::new(mysql_pool(&pool)?)),
            other => return Err(anyhow!("Unknown user store backend: {}", other)),
        };

        let auth = &settings.auth;
        let token_codec: Arc<dyn TokenCodec> = Arc::new(JwtHs256Codec::new(JwtConfig {
            issuer: auth.issuer.clone(),
            audience: auth.audience.clone(),
            access_ttl: Duration::from_secs(auth.access_ttl_secs),
            refresh_ttl: Duration::from_secs(auth.refresh_ttl_secs),
            access_key: auth.access_secret.clone().into_bytes(),
            refresh_key: auth.refresh_secret.clone().into_bytes(),
        }));
        let credential_hasher: Arc<dyn CredentialHasher> = Arc::new(Argon2PasswordHasher::new());

        Ok(Self::from_parts(user_repo, credential_hasher, token_codec, token_store, pool))
    }

    /// Wires the services over already-built ports.
    pub fn from_parts(
        user_repo: Arc<dyn UserRepo>,
        credential_hasher: Arc<dyn CredentialHasher>,
        token_codec: Arc<dyn TokenCodec>,
        token_store: Arc<dyn TokenStore>,
        pool: Option<Pool<MySql>>,
    ) -> Self {
        let session_service: Arc<dyn SessionService> =
            Arc::new(RealSessionService::new(token_codec, token_store));
        let auth_service: Arc<dyn AuthService> = Arc::new(RealAuthService::new(
            user_repo,
            credential_hasher,
            session_service,
        ));

        info!("server started");

        Self { auth_service, pool }
    }

    pub async fn shutdown(&self) {
        info!("server shutting down...");

        if let Some(pool) = &self.pool {
            pool.close().await;
        }
    }
}

fn mysql_pool(pool: &Option<Pool<MySql>>) -> anyhow::Result<Pool<MySql>> {
    pool.clone()
        .ok_or_else(|| anyhow!("mysql pool was not initialised"))
}

/// `refresh_token.user_id` references `user_account`, so MySQL tokens need MySQL users.
fn check_backends(store: &Store) -> anyhow::Result<()> {
    if store.token_backend == "mysql" && store.user_backend != "mysql" {
        return Err(anyhow!(
            "token_backend \"mysql\" requires user_backend \"mysql\", got {:?}",
            store.user_backend
        ));
    }
    Ok(())
}
