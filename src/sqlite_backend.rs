//! SQLite-backed [`CollectionBackend`] implementation.
//!
//! Collections are rows of the `collections` table; their records live in
//! `records` keyed by `(collection, id)`. Embeddings are stored as
//! little-endian `f32` BLOBs and searched by brute-force cosine distance,
//! which is plenty for the few thousand chunks a set of manuals produces.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use manualbase_core::backend::{
    rank_hits, ChunkMetadata, CollectionBackend, CollectionHit, CollectionInfo, CollectionRecord,
};
use manualbase_core::embedding::{blob_to_vec, cosine_distance, vec_to_blob};
use manualbase_core::models::{ChunkKind, Metadata};

/// SQLite implementation of the [`CollectionBackend`] trait.
pub struct SqliteBackend {
    pool: SqlitePool,
}

impl SqliteBackend {
    /// Wrap a pool whose schema has already been migrated.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn require(&self, name: &str) -> Result<()> {
        if !self.exists(name).await? {
            bail!("collection '{}' does not exist", name);
        }
        Ok(())
    }
}

fn row_to_hit(row: &SqliteRow, query_vec: &[f32]) -> Result<CollectionHit> {
    let kind: String = row.get("kind");
    let page_number: i64 = row.get("page_number");
    let metadata_json: String = row.get("metadata_json");
    let blob: Vec<u8> = row.get("embedding");

    let id: String = row.get("id");
    let extra: Metadata = serde_json::from_str(&metadata_json)
        .with_context(|| format!("Corrupt metadata for record '{}'", id))?;

    Ok(CollectionHit {
        id,
        document: row.get("document"),
        metadata: ChunkMetadata {
            source_file: row.get("source_file"),
            page_number: u32::try_from(page_number)
                .map_err(|_| anyhow!("page number {} out of range", page_number))?,
            kind: kind.parse::<ChunkKind>().map_err(|e| anyhow!(e))?,
            equipment_id: row.get("equipment_id"),
            extra,
        },
        distance: cosine_distance(query_vec, &blob_to_vec(&blob)),
    })
}

#[async_trait]
impl CollectionBackend for SqliteBackend {
    async fn create_or_get(&self, name: &str, info: &CollectionInfo) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO collections (name, equipment_id, display_name, created_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(name) DO NOTHING
            "#,
        )
        .bind(name)
        .bind(&info.equipment_id)
        .bind(&info.name)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM collections WHERE name = ?")
            .bind(name)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM records WHERE collection = ?")
            .bind(name)
            .execute(&mut *tx)
            .await?;

        let removed = sqlx::query("DELETE FROM collections WHERE name = ?")
            .bind(name)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;
        Ok(removed > 0)
    }

    async fn upsert(&self, name: &str, records: &[CollectionRecord]) -> Result<()> {
        self.require(name).await?;

        let mut tx = self.pool.begin().await?;
        for record in records {
            let metadata_json = serde_json::to_string(&record.metadata.extra)?;
            sqlx::query(
                r#"
                INSERT INTO records (collection, id, document, source_file, page_number,
                                     kind, equipment_id, metadata_json, embedding)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(collection, id) DO UPDATE SET
                    document = excluded.document,
                    source_file = excluded.source_file,
                    page_number = excluded.page_number,
                    kind = excluded.kind,
                    equipment_id = excluded.equipment_id,
                    metadata_json = excluded.metadata_json,
                    embedding = excluded.embedding
                "#,
            )
            .bind(name)
            .bind(&record.id)
            .bind(&record.document)
            .bind(&record.metadata.source_file)
            .bind(i64::from(record.metadata.page_number))
            .bind(record.metadata.kind.as_str())
            .bind(&record.metadata.equipment_id)
            .bind(metadata_json)
            .bind(vec_to_blob(&record.embedding))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn count(&self, name: &str) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM records WHERE collection = ?")
            .bind(name)
            .fetch_one(&self.pool)
            .await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn query(
        &self,
        name: &str,
        vector: &[f32],
        k: usize,
        kinds: Option<&[ChunkKind]>,
    ) -> Result<Vec<CollectionHit>> {
        self.require(name).await?;

        let mut sql = String::from(
            r#"
            SELECT id, document, source_file, page_number, kind, equipment_id,
                   metadata_json, embedding
            FROM records
            WHERE collection = ?
            "#,
        );
        if let Some(kinds) = kinds {
            if kinds.is_empty() {
                return Ok(Vec::new());
            }
            let placeholders = vec!["?"; kinds.len()].join(", ");
            sql.push_str(&format!(" AND kind IN ({})", placeholders));
        }

        let mut query = sqlx::query(&sql).bind(name);
        for kind in kinds.unwrap_or_default() {
            query = query.bind(kind.as_str());
        }
        let rows = query.fetch_all(&self.pool).await?;

        let hits = rows
            .iter()
            .map(|row| row_to_hit(row, vector))
            .collect::<Result<Vec<_>>>()?;

        Ok(rank_hits(hits, k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate::migrate_pool;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn backend() -> SqliteBackend {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        migrate_pool(&pool).await.unwrap();
        SqliteBackend::new(pool)
    }

    fn info() -> CollectionInfo {
        CollectionInfo {
            equipment_id: "gen".to_string(),
            name: "Generator".to_string(),
        }
    }

    fn record(id: &str, kind: ChunkKind, embedding: Vec<f32>) -> CollectionRecord {
        let mut extra = Metadata::new();
        extra.insert("table_index".to_string(), serde_json::json!(2));
        CollectionRecord {
            id: id.to_string(),
            document: format!("document {}", id),
            metadata: ChunkMetadata {
                source_file: "gen.pdf".to_string(),
                page_number: 7,
                kind,
                equipment_id: "gen".to_string(),
                extra,
            },
            embedding,
        }
    }

    #[tokio::test]
    async fn test_create_is_idempotent() {
        let backend = backend().await;
        backend.create_or_get("equip_gen", &info()).await.unwrap();
        backend.create_or_get("equip_gen", &info()).await.unwrap();
        assert!(backend.exists("equip_gen").await.unwrap());
        assert!(!backend.exists("equip_other").await.unwrap());
    }

    #[tokio::test]
    async fn test_upsert_count_and_overwrite() {
        let backend = backend().await;
        backend.create_or_get("equip_gen", &info()).await.unwrap();
        backend
            .upsert(
                "equip_gen",
                &[
                    record("a", ChunkKind::Text, vec![1.0, 0.0]),
                    record("b", ChunkKind::Table, vec![0.0, 1.0]),
                ],
            )
            .await
            .unwrap();
        backend
            .upsert("equip_gen", &[record("a", ChunkKind::Text, vec![0.5, 0.5])])
            .await
            .unwrap();
        assert_eq!(backend.count("equip_gen").await.unwrap(), 2);
        assert_eq!(backend.count("equip_missing").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_query_ranks_filters_and_restores_metadata() {
        let backend = backend().await;
        backend.create_or_get("equip_gen", &info()).await.unwrap();
        backend
            .upsert(
                "equip_gen",
                &[
                    record("far", ChunkKind::Text, vec![0.0, 1.0]),
                    record("near", ChunkKind::Table, vec![1.0, 0.0]),
                ],
            )
            .await
            .unwrap();

        let hits = backend.query("equip_gen", &[1.0, 0.0], 5, None).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, "near");
        assert!(hits[0].distance.abs() < 1e-6);
        assert_eq!(hits[0].metadata.kind, ChunkKind::Table);
        assert_eq!(hits[0].metadata.page_number, 7);
        assert_eq!(
            hits[0].metadata.extra.get("table_index"),
            Some(&serde_json::json!(2))
        );

        let hits = backend
            .query("equip_gen", &[1.0, 0.0], 5, Some(&[ChunkKind::Text]))
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "far");
    }

    #[tokio::test]
    async fn test_query_reports_corrupt_metadata() {
        let backend = backend().await;
        backend.create_or_get("equip_gen", &info()).await.unwrap();
        backend
            .upsert("equip_gen", &[record("a", ChunkKind::Text, vec![1.0, 0.0])])
            .await
            .unwrap();
        sqlx::query("UPDATE records SET metadata_json = '{broken' WHERE id = 'a'")
            .execute(&backend.pool)
            .await
            .unwrap();

        let err = backend
            .query("equip_gen", &[1.0, 0.0], 1, None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Corrupt metadata for record 'a'"));
    }

    #[tokio::test]
    async fn test_delete_removes_records() {
        let backend = backend().await;
        backend.create_or_get("equip_gen", &info()).await.unwrap();
        backend
            .upsert("equip_gen", &[record("a", ChunkKind::Text, vec![1.0])])
            .await
            .unwrap();

        assert!(backend.delete("equip_gen").await.unwrap());
        assert!(!backend.delete("equip_gen").await.unwrap());
        assert_eq!(backend.count("equip_gen").await.unwrap(), 0);
        assert!(backend.upsert("equip_gen", &[]).await.is_err());
        assert!(backend.query("equip_gen", &[1.0], 1, None).await.is_err());
    }
}
