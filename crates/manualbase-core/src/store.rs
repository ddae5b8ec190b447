//! The equipment store: registry, collections, and retrieval behind one
//! handle.
//!
//! [`EquipmentStore`] owns the [`EquipmentRegistry`] behind a
//! `tokio::sync::Mutex`. Every registry mutation holds that lock across the
//! whole read-modify-write-persist, so concurrent callers in one process are
//! serialized and cannot lose updates. Chunk writes and queries only take the
//! lock long enough to resolve the equipment's collection name.
//!
//! # Lifecycle
//!
//! ```text
//! Unregistered ──register──▶ Registered (empty) ──add_chunks──▶ Populated
//!       ▲                           │                               │
//!       └─────────────delete────────┴───────────────delete──────────┘
//! ```

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::backend::memory::InMemoryBackend;
use crate::backend::{CollectionBackend, CollectionInfo};
use crate::collection::{CollectionStore, DEFAULT_BATCH_SIZE};
use crate::embedding::Embedder;
use crate::error::{Result, StoreError};
use crate::identity::collection_name;
use crate::models::{Chunk, ChunkKind, CollectionStats, Equipment};
use crate::registry::{EquipmentRegistry, MemorySnapshot, RegistryEntry, RegistrySnapshot};
use crate::search::RetrievalHit;

pub struct EquipmentStore {
    registry: Mutex<EquipmentRegistry>,
    collections: CollectionStore,
}

impl EquipmentStore {
    /// Load the registry from `snapshot` and wire it to `backend`.
    pub fn open(
        backend: Arc<dyn CollectionBackend>,
        embedder: Arc<dyn Embedder>,
        snapshot: Box<dyn RegistrySnapshot>,
        batch_size: usize,
    ) -> Result<Self> {
        let registry = EquipmentRegistry::open(snapshot)?;
        debug!(equipment = registry.len(), "equipment registry loaded");
        Ok(Self {
            registry: Mutex::new(registry),
            collections: CollectionStore::new(backend, embedder, batch_size),
        })
    }

    /// A store with no durable state at all.
    pub fn in_memory(embedder: Arc<dyn Embedder>) -> Result<Self> {
        Self::open(
            Arc::new(InMemoryBackend::new()),
            embedder,
            Box::new(MemorySnapshot::new()),
            DEFAULT_BATCH_SIZE,
        )
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        self.collections.embedder()
    }

    /// Register a new equipment and create its backing collection.
    pub async fn register(&self, id: &str, name: &str, description: &str) -> Result<Equipment> {
        if id.trim().is_empty() {
            return Err(StoreError::InvalidInput(
                "equipment id must not be empty".to_string(),
            ));
        }

        let mut registry = self.registry.lock().await;
        if registry.contains(id) {
            return Err(StoreError::AlreadyExists(id.to_string()));
        }

        let collection = collection_name(id);
        if let Some(existing) = registry.owner_of_collection(&collection) {
            return Err(StoreError::CollectionConflict {
                id: id.to_string(),
                collection,
                existing: existing.to_string(),
            });
        }

        // No entry owns this name, so anything stored under it is stale.
        if self.collections.drop_collection(&collection).await? {
            warn!(collection = %collection, "dropped stale collection before registering");
        }

        let info = CollectionInfo {
            equipment_id: id.to_string(),
            name: name.to_string(),
        };
        self.collections.create(&collection, &info).await?;

        let entry = RegistryEntry {
            name: name.to_string(),
            description: description.to_string(),
            collection_name: collection.clone(),
            manual_count: 0,
            chunk_count: 0,
        };
        if let Err(e) = registry.insert(id, entry) {
            if let Err(drop_err) = self.collections.drop_collection(&collection).await {
                warn!(collection = %collection, error = %drop_err, "could not drop orphaned collection");
            }
            return Err(e);
        }

        info!(equipment = id, collection = %collection, "registered equipment");
        registry
            .get(id)
            .ok_or_else(|| StoreError::NotRegistered(id.to_string()))
    }

    /// All registered equipment, ordered by id.
    pub async fn list(&self) -> Vec<Equipment> {
        self.registry.lock().await.list()
    }

    pub async fn get(&self, id: &str) -> Option<Equipment> {
        self.registry.lock().await.get(id)
    }

    /// Remove the registry entry, then drop the backing collection.
    ///
    /// If the registry cannot be persisted nothing is dropped. A missing
    /// collection or a backend failure while dropping it is logged and
    /// tolerated; [`register`](Self::register) clears any leftover.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let mut registry = self.registry.lock().await;
        let entry = registry.remove(id)?;
        self.drop_collection_tolerant(&entry.collection_name).await;
        info!(equipment = id, "deleted equipment");
        Ok(())
    }

    /// Delete every registered equipment. Returns how many were removed.
    pub async fn reset_all(&self) -> Result<usize> {
        let mut registry = self.registry.lock().await;
        let ids = registry.ids();
        for id in &ids {
            let entry = registry.remove(id)?;
            self.drop_collection_tolerant(&entry.collection_name).await;
        }
        info!(removed = ids.len(), "reset all equipment");
        Ok(ids.len())
    }

    async fn drop_collection_tolerant(&self, collection: &str) {
        match self.collections.drop_collection(collection).await {
            Ok(true) => debug!(collection, "dropped collection"),
            Ok(false) => debug!(collection, "collection already absent"),
            Err(e) => warn!(collection, error = %e, "failed to drop collection, continuing"),
        }
    }

    /// Embed and store `chunks` for equipment `id`.
    ///
    /// Chunks with blank text or another equipment's id are skipped. Returns
    /// the number of chunks written. When at least one chunk is written the
    /// cached `chunk_count` is refreshed from the collection and, if
    /// `source_file` is given, `manual_count` is incremented.
    pub async fn add_chunks(
        &self,
        id: &str,
        chunks: &[Chunk],
        source_file: Option<&str>,
    ) -> Result<usize> {
        let collection = self.collection_of(id).await?;

        let mut kept = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            if chunk.text.trim().is_empty() {
                continue;
            }
            if chunk.equipment_id != id {
                warn!(
                    equipment = id,
                    chunk_id = %chunk.id,
                    chunk_equipment = %chunk.equipment_id,
                    "skipping chunk owned by another equipment"
                );
                continue;
            }
            kept.push(chunk.clone());
        }
        if kept.is_empty() {
            return Ok(0);
        }

        let report = self.collections.write(&collection, &kept).await;
        if report.written == 0 {
            if let Some(e) = report.last_error {
                return Err(e);
            }
        }
        if report.failed > 0 {
            warn!(
                equipment = id,
                written = report.written,
                failed = report.failed,
                "some chunks were skipped"
            );
        }

        let manual_delta = u64::from(source_file.is_some_and(|s| !s.trim().is_empty()));
        let mut registry = self.registry.lock().await;
        let total = self.collections.count(&collection).await?;
        registry.update_counts(id, total, manual_delta)?;

        info!(
            equipment = id,
            written = report.written,
            total_chunks = total,
            "added chunks"
        );
        Ok(report.written)
    }

    /// Number of chunks stored for `id`.
    pub async fn count(&self, id: &str) -> Result<u64> {
        let collection = self.collection_of(id).await?;
        self.collections.count(&collection).await
    }

    /// The `k` chunks of `id` nearest to `question`, closest first.
    pub async fn query(
        &self,
        id: &str,
        question: &str,
        k: usize,
        kinds: Option<&[ChunkKind]>,
    ) -> Result<Vec<RetrievalHit>> {
        let collection = self.collection_of(id).await?;
        let hits = self
            .collections
            .search(&collection, question, k, kinds)
            .await?;
        debug!(equipment = id, k, hits = hits.len(), "query answered");
        Ok(hits.into_iter().map(RetrievalHit::from).collect())
    }

    pub async fn collection_stats(&self, id: &str) -> Result<CollectionStats> {
        let equipment = self
            .get(id)
            .await
            .ok_or_else(|| StoreError::NotRegistered(id.to_string()))?;
        let total_chunks = self.collections.count(&equipment.collection_name).await?;
        Ok(CollectionStats {
            equipment_id: equipment.equipment_id,
            name: equipment.name,
            collection_name: equipment.collection_name,
            total_chunks,
            manual_count: equipment.manual_count,
        })
    }

    async fn collection_of(&self, id: &str) -> Result<String> {
        self.registry
            .lock()
            .await
            .entry(id)
            .map(|e| e.collection_name.clone())
            .ok_or_else(|| StoreError::NotRegistered(id.to_string()))
    }
}
