//! Vector collection backend abstraction.
//!
//! The [`CollectionBackend`] trait is the only thing the collection store
//! needs from a vector database: named collections holding
//! `(id, document, metadata, embedding)` records, upsert by id, count,
//! delete, and nearest-neighbour query with an optional kind filter.
//! Pluggable backends (SQLite, in-memory) implement it.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::{Chunk, ChunkKind, Metadata};

/// Descriptive metadata attached to a collection when it is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub equipment_id: String,
    pub name: String,
}

/// Provenance stored next to each document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub source_file: String,
    pub page_number: u32,
    pub kind: ChunkKind,
    pub equipment_id: String,
    #[serde(default, skip_serializing_if = "Metadata::is_empty")]
    pub extra: Metadata,
}

/// One record written to a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionRecord {
    pub id: String,
    pub document: String,
    pub metadata: ChunkMetadata,
    pub embedding: Vec<f32>,
}

impl CollectionRecord {
    pub fn from_chunk(chunk: &Chunk, embedding: Vec<f32>) -> Self {
        Self {
            id: chunk.id.clone(),
            document: chunk.text.clone(),
            metadata: ChunkMetadata {
                source_file: chunk.source_file.clone(),
                page_number: chunk.page_number,
                kind: chunk.kind,
                equipment_id: chunk.equipment_id.clone(),
                extra: chunk.metadata.clone(),
            },
            embedding,
        }
    }
}

/// A nearest-neighbour match returned by [`CollectionBackend::query`].
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionHit {
    pub id: String,
    pub document: String,
    pub metadata: ChunkMetadata,
    /// Cosine distance to the query vector; smaller is closer.
    pub distance: f32,
}

/// Abstract vector collection backend.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`create_or_get`](CollectionBackend::create_or_get) | Ensure a named collection exists |
/// | [`exists`](CollectionBackend::exists) | Check whether a collection exists |
/// | [`delete`](CollectionBackend::delete) | Drop a collection (`false` if it was absent) |
/// | [`upsert`](CollectionBackend::upsert) | Insert or overwrite records by id |
/// | [`count`](CollectionBackend::count) | Record count (`0` if absent) |
/// | [`query`](CollectionBackend::query) | `k` nearest records, ascending distance |
#[async_trait]
pub trait CollectionBackend: Send + Sync {
    async fn create_or_get(&self, name: &str, info: &CollectionInfo) -> Result<()>;

    async fn exists(&self, name: &str) -> Result<bool>;

    async fn delete(&self, name: &str) -> Result<bool>;

    /// Insert or overwrite records. Fails if the collection does not exist.
    async fn upsert(&self, name: &str, records: &[CollectionRecord]) -> Result<()>;

    async fn count(&self, name: &str) -> Result<u64>;

    /// Return up to `k` records ordered by ascending cosine distance.
    /// Fails if the collection does not exist.
    async fn query(
        &self,
        name: &str,
        vector: &[f32],
        k: usize,
        kinds: Option<&[ChunkKind]>,
    ) -> Result<Vec<CollectionHit>>;
}

/// Sort hits by ascending distance, breaking ties by id, and keep `k`.
pub fn rank_hits(mut hits: Vec<CollectionHit>, k: usize) -> Vec<CollectionHit> {
    hits.sort_by(|a, b| {
        a.distance
            .total_cmp(&b.distance)
            .then_with(|| a.id.cmp(&b.id))
    });
    hits.truncate(k);
    hits
}
