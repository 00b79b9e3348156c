use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::config::config;
use crate::filter::FilterError;

/// Errors from the database layer
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid id: {0}")]
    InvalidId(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Builds the connection pool and owns schema migrations
pub struct DatabaseManager;

impl DatabaseManager {
    fn pool_options() -> PgPoolOptions {
        let database = &config().database;
        PgPoolOptions::new()
            .max_connections(database.max_connections)
            .acquire_timeout(Duration::from_secs(database.connection_timeout))
    }

    fn connection_string() -> Result<String, DatabaseError> {
        let database_url = &config().database.url;
        if database_url.is_empty() {
            return Err(DatabaseError::ConfigMissing("DATABASE_URL"));
        }
        let url = url::Url::parse(database_url).map_err(|_| DatabaseError::InvalidDatabaseUrl)?;
        if !matches!(url.scheme(), "postgres" | "postgresql") {
            return Err(DatabaseError::InvalidDatabaseUrl);
        }
        Ok(url.into())
    }

    /// Host and database name only, for logging
    fn describe(connection_string: &str) -> String {
        url::Url::parse(connection_string)
            .map(|url| format!("{}{}", url.host_str().unwrap_or("localhost"), url.path()))
            .unwrap_or_default()
    }

    /// Connects eagerly, failing fast when the database is unreachable
    pub async fn connect() -> Result<PgPool, DatabaseError> {
        let connection_string = Self::connection_string()?;
        let pool = Self::pool_options().connect(&connection_string).await?;
        info!("Connected to database: {}", Self::describe(&connection_string));
        Ok(pool)
    }

    /// Pool whose connections are opened on first use
    pub fn connect_lazy() -> Result<PgPool, DatabaseError> {
        let connection_string = Self::connection_string()?;
        let pool = Self::pool_options().connect_lazy(&connection_string)?;
        info!("Created database pool for: {}", Self::describe(&connection_string));
        Ok(pool)
    }

    /// Applies the embedded schema migrations
    pub async fn run_migrations(pool: &PgPool) -> Result<(), DatabaseError> {
        sqlx::migrate!("./migrations").run(pool).await?;
        info!("Database migrations applied");
        Ok(())
    }

    /// Pings the pool to ensure connectivity
    pub async fn health_check(pool: &PgPool) -> Result<(), DatabaseError> {
        sqlx::query("SELECT 1").execute(pool).await?;
        Ok(())
    }
}
