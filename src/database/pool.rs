use crate::config::DatabaseConfig;
use sqlx::migrate::{MigrateError, Migrator};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::path::Path;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("Failed to connect to database: {0}")]
    Connect(sqlx::Error),

    #[error("Database did not answer within the acquire timeout")]
    ConnectionTimeout,

    #[error("Database health check failed: {0}")]
    HealthCheck(sqlx::Error),

    #[error("Database migration failed: {0}")]
    Migration(#[from] MigrateError),
}

impl DatabaseError {
    fn from_health_check(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => DatabaseError::ConnectionTimeout,
            other => DatabaseError::HealthCheck(other),
        }
    }
}

/// Handle on the Postgres pool shared by every repository
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open the pool with the configured limits. Connections are verified on
    /// first use by [`Database::health_check`].
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DatabaseError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
            .idle_timeout(config.idle_timeout())
            .max_lifetime(config.max_lifetime())
            .test_before_acquire(config.test_before_acquire)
            .connect(&config.url)
            .await
            .map_err(|e| match e {
                sqlx::Error::PoolTimedOut => DatabaseError::ConnectionTimeout,
                other => DatabaseError::Connect(other),
            })?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Round-trip a trivial query and report the server version
    pub async fn health_check(&self) -> Result<String, DatabaseError> {
        let version: String = sqlx::query_scalar("SHOW server_version")
            .fetch_one(&self.pool)
            .await
            .map_err(DatabaseError::from_health_check)?;

        Ok(version)
    }

    /// Apply pending migrations from `path`
    pub async fn migrate(&self, path: &str) -> Result<(), DatabaseError> {
        let migrator = Migrator::new(Path::new(path)).await?;
        let pending = migrator.iter().count();

        migrator.run(&self.pool).await?;
        info!("Schema up to date ({} migrations known in {})", pending, path);

        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
