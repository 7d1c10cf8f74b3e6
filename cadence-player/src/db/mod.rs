//! SQLite persistence
//!
//! Two tables, one row per tenant:
//! - `queues(tenant_id PRIMARY KEY, queue_blob)` — JSON array of stored items
//! - `guild_settings(tenant_id PRIMARY KEY, volume)` — playback volume
//!
//! Same-tenant writes are serialized by the per-tenant session lock upstream;
//! different tenants may write concurrently through the shared pool.

pub mod queues;
pub mod settings;

use crate::error::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use tracing::info;

/// Open (creating if missing) the database file and prepare the schema.
pub async fn connect(path: &Path) -> Result<Pool<Sqlite>> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);

    let pool = SqlitePoolOptions::new().connect_with(options).await?;
    init(&pool).await?;
    info!("Database ready at {}", path.display());
    Ok(pool)
}

/// Create tables if they don't exist.
pub async fn init(db: &Pool<Sqlite>) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS queues (
            tenant_id INTEGER PRIMARY KEY,
            queue_blob TEXT NOT NULL
        )
        "#,
    )
    .execute(db)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS guild_settings (
            tenant_id INTEGER PRIMARY KEY,
            volume INTEGER NOT NULL DEFAULT 50
        )
        "#,
    )
    .execute(db)
    .await?;

    Ok(())
}

#[cfg(test)]
pub(crate) async fn test_pool() -> Pool<Sqlite> {
    // One connection: every pooled connection to sqlite::memory: would
    // otherwise open its own separate database.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    init(&pool).await.unwrap();
    pool
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn connect_creates_file_and_schema() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cadence.db");
        let pool = connect(&path).await.unwrap();
        assert!(path.exists());

        // Schema is queryable.
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM queues")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn init_is_idempotent() {
        let pool = test_pool().await;
        init(&pool).await.unwrap();
        init(&pool).await.unwrap();
    }
}
