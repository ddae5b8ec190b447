//! In-memory [`CollectionBackend`] implementation for tests and embedding
//! the store without a database.
//!
//! Collections live in a `HashMap` behind a `tokio::sync::RwLock`. Query is
//! brute-force cosine distance over every record of the collection.

use std::collections::{BTreeMap, HashMap};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::embedding::cosine_distance;
use crate::models::ChunkKind;

use super::{rank_hits, CollectionBackend, CollectionHit, CollectionInfo, CollectionRecord};

type MemCollection = BTreeMap<String, CollectionRecord>;

/// In-memory collection backend.
#[derive(Default)]
pub struct InMemoryBackend {
    collections: RwLock<HashMap<String, MemCollection>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of all existing collections, sorted.
    pub async fn collection_names(&self) -> Vec<String> {
        let collections = self.collections.read().await;
        let mut names: Vec<String> = collections.keys().cloned().collect();
        names.sort();
        names
    }
}

#[async_trait]
impl CollectionBackend for InMemoryBackend {
    async fn create_or_get(&self, name: &str, _info: &CollectionInfo) -> Result<()> {
        let mut collections = self.collections.write().await;
        collections.entry(name.to_string()).or_default();
        Ok(())
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        Ok(self.collections.read().await.contains_key(name))
    }

    async fn delete(&self, name: &str) -> Result<bool> {
        Ok(self.collections.write().await.remove(name).is_some())
    }

    async fn upsert(&self, name: &str, records: &[CollectionRecord]) -> Result<()> {
        let mut collections = self.collections.write().await;
        let collection = collections
            .get_mut(name)
            .ok_or_else(|| anyhow!("collection '{}' does not exist", name))?;
        for record in records {
            collection.insert(record.id.clone(), record.clone());
        }
        Ok(())
    }

    async fn count(&self, name: &str) -> Result<u64> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(name)
            .map(|c| c.len() as u64)
            .unwrap_or(0))
    }

    async fn query(
        &self,
        name: &str,
        vector: &[f32],
        k: usize,
        kinds: Option<&[ChunkKind]>,
    ) -> Result<Vec<CollectionHit>> {
        let collections = self.collections.read().await;
        let collection = collections
            .get(name)
            .ok_or_else(|| anyhow!("collection '{}' does not exist", name))?;

        let hits = collection
            .values()
            .filter(|r| kinds.map_or(true, |ks| ks.contains(&r.metadata.kind)))
            .map(|r| CollectionHit {
                id: r.id.clone(),
                document: r.document.clone(),
                metadata: r.metadata.clone(),
                distance: cosine_distance(vector, &r.embedding),
            })
            .collect();

        Ok(rank_hits(hits, k))
    }
}
