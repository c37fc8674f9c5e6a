//! Long-lived connections shared by every request.
use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::AppState;
use crate::cache::{Cache, NoCache, RedisCache};
use crate::config::Configuration;
use crate::user::UserRepository;
use crate::user::memory::MemoryUserRepository;
use crate::user::postgres::PgUserRepository;

pub const DEFAULT_CREDENTIALS: &str = "postgres";
pub const DEFAULT_DATABASE_NAME: &str = "users";
pub const DEFAULT_POOL_SIZE: u32 = 10;

/// Connection handles opened at start and closed at shutdown.
#[derive(Clone, Default)]
pub struct Database {
    pub postgres: Option<PgPool>,
    pub redis: Option<RedisCache>,
}

impl Database {
    /// Open configured connections.
    ///
    /// PostgreSQL failures are fatal. Redis failures are not: the service
    /// then runs without cache.
    pub async fn connect(config: &Configuration) -> Result<Self, sqlx::Error> {
        let postgres = match &config.postgres {
            Some(pg) => {
                let url = match &pg.url {
                    Some(url) => url.clone(),
                    None => format!(
                        "postgres://{}:{}@{}/{}",
                        pg.username.as_deref().unwrap_or(DEFAULT_CREDENTIALS),
                        pg.password.as_deref().unwrap_or(DEFAULT_CREDENTIALS),
                        pg.address,
                        pg.database.as_deref().unwrap_or(DEFAULT_DATABASE_NAME),
                    ),
                };

                let pool = PgPoolOptions::new()
                    .max_connections(pg.pool_size.unwrap_or(DEFAULT_POOL_SIZE))
                    .connect(&url)
                    .await?;
                tracing::info!(hostname = %pg.address, "postgres connected");

                Some(pool)
            },
            None => None,
        };

        let redis = match &config.redis {
            Some(cfg) => match RedisCache::connect(&cfg.url).await {
                Ok(cache) => Some(cache),
                Err(err) => {
                    tracing::warn!(error = %err, "redis unreachable, running without cache");
                    None
                },
            },
            None => None,
        };

        Ok(Self { postgres, redis })
    }

    /// Record store over the open connections.
    pub fn repository(&self) -> Arc<dyn UserRepository> {
        match &self.postgres {
            Some(pool) => Arc::new(PgUserRepository::new(pool.clone())),
            None => {
                tracing::warn!("no `postgres` entry, users are kept in memory");
                Arc::new(MemoryUserRepository::new())
            },
        }
    }

    /// Cache over the open connections, or [`NoCache`].
    pub fn cache(&self) -> Arc<dyn Cache> {
        match &self.redis {
            Some(redis) => Arc::new(redis.clone()),
            None => Arc::new(NoCache),
        }
    }

    /// Close the pool, waiting for checked-out connections to return.
    pub async fn close(&self) {
        if let Some(pool) = &self.postgres {
            pool.close().await;
            tracing::info!("postgres connection closed");
        }
    }
}

impl FromRef<AppState> for Database {
    fn from_ref(app_state: &AppState) -> Database {
        app_state.db.clone()
    }
}
