//! Collection store: embeds chunks and writes them into a named backend
//! collection, and answers nearest-neighbour lookups against it.
//!
//! Writes go out in batches of `batch_size`. A failed batch (embedding or
//! upsert) is retried one chunk at a time so a single bad chunk cannot sink
//! its neighbours; chunks that still fail are skipped and reported in the
//! [`WriteReport`].

use std::slice;
use std::sync::Arc;

use anyhow::anyhow;
use tracing::{debug, warn};

use crate::backend::{CollectionBackend, CollectionHit, CollectionInfo, CollectionRecord};
use crate::embedding::Embedder;
use crate::error::{Result, StoreError};
use crate::models::{Chunk, ChunkKind};

/// Default number of chunks embedded and written per batch.
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Outcome of [`CollectionStore::write`].
#[derive(Debug, Default)]
pub struct WriteReport {
    pub written: usize,
    pub failed: usize,
    /// The most recent per-chunk failure, if any.
    pub last_error: Option<StoreError>,
}

pub struct CollectionStore {
    backend: Arc<dyn CollectionBackend>,
    embedder: Arc<dyn Embedder>,
    batch_size: usize,
}

impl CollectionStore {
    pub fn new(
        backend: Arc<dyn CollectionBackend>,
        embedder: Arc<dyn Embedder>,
        batch_size: usize,
    ) -> Self {
        Self {
            backend,
            embedder,
            batch_size: batch_size.max(1),
        }
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    pub async fn create(&self, name: &str, info: &CollectionInfo) -> Result<()> {
        self.backend
            .create_or_get(name, info)
            .await
            .map_err(|e| StoreError::backend(format!("create collection '{}'", name), e))
    }

    /// Drop a collection. `Ok(false)` if it did not exist.
    pub async fn drop_collection(&self, name: &str) -> Result<bool> {
        self.backend
            .delete(name)
            .await
            .map_err(|e| StoreError::backend(format!("delete collection '{}'", name), e))
    }

    pub async fn count(&self, name: &str) -> Result<u64> {
        self.backend
            .count(name)
            .await
            .map_err(|e| StoreError::backend(format!("count collection '{}'", name), e))
    }

    /// Embed and upsert `chunks` into collection `name`.
    pub async fn write(&self, name: &str, chunks: &[Chunk]) -> WriteReport {
        let mut report = WriteReport::default();
        let total_batches = chunks.len().div_ceil(self.batch_size);

        for (i, batch) in chunks.chunks(self.batch_size).enumerate() {
            match self.write_batch(name, batch).await {
                Ok(()) => {
                    report.written += batch.len();
                    debug!(
                        collection = name,
                        batch = i + 1,
                        total_batches,
                        chunks = batch.len(),
                        "batch written"
                    );
                }
                Err(e) => {
                    warn!(
                        collection = name,
                        batch = i + 1,
                        error = %e,
                        "batch failed, retrying chunk by chunk"
                    );
                    for chunk in batch {
                        match self.write_batch(name, slice::from_ref(chunk)).await {
                            Ok(()) => report.written += 1,
                            Err(e) => {
                                warn!(
                                    collection = name,
                                    chunk_id = %chunk.id,
                                    error = %e,
                                    "skipping chunk"
                                );
                                report.failed += 1;
                                report.last_error = Some(e);
                            }
                        }
                    }
                }
            }
        }

        report
    }

    async fn write_batch(&self, name: &str, batch: &[Chunk]) -> Result<()> {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let vectors = self
            .embedder
            .embed(&texts)
            .await
            .map_err(StoreError::EmbeddingUnavailable)?;
        if vectors.len() != batch.len() {
            return Err(StoreError::EmbeddingUnavailable(anyhow!(
                "embedder returned {} vectors for {} texts",
                vectors.len(),
                batch.len()
            )));
        }

        let records: Vec<CollectionRecord> = batch
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| CollectionRecord::from_chunk(chunk, vector))
            .collect();

        self.backend
            .upsert(name, &records)
            .await
            .map_err(|e| StoreError::backend(format!("upsert into '{}'", name), e))
    }

    /// Nearest records to `question`, `k` clamped to the collection size.
    ///
    /// An empty collection or `k == 0` returns no hits without calling the
    /// embedder.
    pub async fn search(
        &self,
        name: &str,
        question: &str,
        k: usize,
        kinds: Option<&[ChunkKind]>,
    ) -> Result<Vec<CollectionHit>> {
        let count = self.count(name).await?;
        let k = k.min(usize::try_from(count).unwrap_or(usize::MAX));
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut vectors = self
            .embedder
            .embed(&[question.to_string()])
            .await
            .map_err(StoreError::EmbeddingUnavailable)?;
        let vector = vectors
            .pop()
            .ok_or_else(|| StoreError::EmbeddingUnavailable(anyhow!("embedder returned no vector")))?;

        self.backend
            .query(name, &vector, k, kinds)
            .await
            .map_err(|e| StoreError::backend(format!("query collection '{}'", name), e))
    }
}
