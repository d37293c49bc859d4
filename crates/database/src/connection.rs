use crate::error::DbError;
use configuration::DatabaseSettings;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use tracing::info;

const SCHEMA: &str = include_str!("../sql/schema.sql");

/// Establishes a connection pool to the PostgreSQL database.
///
/// The pool is the explicit session object of the application: it is created
/// once at startup and handed to every component that needs the store.
/// Connections are checked out per query or transaction and returned on drop.
pub async fn connect(database_url: &str, settings: &DatabaseSettings) -> Result<PgPool, DbError> {
    if database_url.trim().is_empty() {
        return Err(DbError::ConnectionConfigError("database url is empty".to_string()));
    }

    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(Duration::from_secs(settings.acquire_timeout_secs))
        .connect(database_url)
        .await?;

    info!(max_connections = settings.max_connections, "Connected to PostgreSQL.");
    Ok(pool)
}

/// Creates the `trades` and `dashboard_links` tables when they do not exist yet.
///
/// Every statement is idempotent, so this runs on every startup.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), DbError> {
    sqlx::raw_sql(SCHEMA).execute(pool).await?;
    Ok(())
}
