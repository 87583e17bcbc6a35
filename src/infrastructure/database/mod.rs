//! Database Module
//!
//! SQLite connection pool and schema migrations.

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::config::DatabaseSettings;

/// Create a SQLite connection pool
pub async fn create_pool(settings: &DatabaseSettings) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(&settings.url)?.create_if_missing(true);

    // An in-memory database lives and dies with its connection, so it must
    // be exactly one connection that is never recycled.
    if settings.is_in_memory() {
        return SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await;
    }

    SqlitePoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(Duration::from_secs(settings.acquire_timeout))
        .connect_with(options)
        .await
}

/// Run database migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// In-memory pool with the schema applied.
pub async fn create_in_memory_pool() -> Result<SqlitePool, crate::shared::error::StoreError> {
    let pool = create_pool(&DatabaseSettings::in_memory()).await?;
    run_migrations(&pool).await?;
    Ok(pool)
}
