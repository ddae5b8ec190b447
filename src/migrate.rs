use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// Open the database and create the schema (idempotent).
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    migrate_pool(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create the collection schema on an open pool.
pub async fn migrate_pool(pool: &SqlitePool) -> Result<()> {
    // One row per equipment collection
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS collections (
            name TEXT PRIMARY KEY,
            equipment_id TEXT NOT NULL,
            display_name TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Documents with provenance and their embedding vectors
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS records (
            collection TEXT NOT NULL,
            id TEXT NOT NULL,
            document TEXT NOT NULL,
            source_file TEXT NOT NULL,
            page_number INTEGER NOT NULL,
            kind TEXT NOT NULL,
            equipment_id TEXT NOT NULL,
            metadata_json TEXT NOT NULL DEFAULT '{}',
            embedding BLOB NOT NULL,
            PRIMARY KEY (collection, id),
            FOREIGN KEY (collection) REFERENCES collections(name) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_records_collection_kind ON records(collection, kind)")
        .execute(pool)
        .await?;

    Ok(())
}
