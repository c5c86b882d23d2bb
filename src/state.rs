use crate::auth::{jwt::JwtKeys, password::Hasher};
use crate::config::AppConfig;
use crate::users::{
    memory::MemoryUserStore,
    repo::{PgUserStore, UserStore},
    services::AccountService,
};
use anyhow::Context;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub accounts: Arc<AccountService>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let store: Arc<dyn UserStore> = match &config.database_url {
            Some(url) => {
                let db = sqlx::postgres::PgPoolOptions::new()
                    .max_connections(10)
                    .connect(url)
                    .await
                    .context("connect to database")?;

                // Run migrations if present
                if let Err(e) = sqlx::migrate!("./migrations").run(&db).await {
                    tracing::warn!(error = %e, "migration failed; continuing");
                }
                Arc::new(PgUserStore::new(db))
            }
            None => {
                tracing::warn!("DATABASE_URL not set; users are kept in memory only");
                Arc::new(MemoryUserStore::new())
            }
        };

        Self::from_parts(config, store)
    }

    pub fn from_parts(config: Arc<AppConfig>, store: Arc<dyn UserStore>) -> anyhow::Result<Self> {
        let hasher = Hasher::new(&config.password)?;
        let keys = JwtKeys::new(&config.jwt);
        let accounts = Arc::new(AccountService::new(store, hasher, keys)?);
        Ok(Self { config, accounts })
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        use crate::config::PasswordConfig;

        let config = Arc::new(AppConfig {
            database_url: None,
            jwt: crate::auth::jwt::test_jwt_config(),
            password: PasswordConfig {
                memory_kib: 256,
                iterations: 1,
                parallelism: 1,
            },
        });
        Self::from_parts(config, Arc::new(MemoryUserStore::new())).expect("fake state")
    }
}
