//! Equipment registry: the durable mapping from equipment id to its
//! metadata and cached counters.
//!
//! The registry is loaded wholesale from a [`RegistrySnapshot`] when opened
//! and written back wholesale after every mutation. A failed write rolls the
//! in-memory change back, so memory never runs ahead of the snapshot.
//!
//! The registry itself does no locking; [`EquipmentStore`](crate::store::EquipmentStore)
//! owns it behind a mutex so every read-modify-write is serialized.

use std::collections::BTreeMap;
use std::sync::Mutex;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};
use crate::models::Equipment;

/// Persisted record of one equipment, keyed by its id in the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryEntry {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub collection_name: String,
    #[serde(default)]
    pub manual_count: u64,
    #[serde(default)]
    pub chunk_count: u64,
}

impl RegistryEntry {
    fn to_equipment(&self, id: &str) -> Equipment {
        Equipment {
            equipment_id: id.to_string(),
            name: self.name.clone(),
            description: self.description.clone(),
            collection_name: self.collection_name.clone(),
            manual_count: self.manual_count,
            chunk_count: self.chunk_count,
        }
    }
}

pub type RegistryMap = BTreeMap<String, RegistryEntry>;

/// Durable storage for the whole registry.
pub trait RegistrySnapshot: Send + Sync {
    /// Load every entry. A missing snapshot is an empty registry.
    fn load(&self) -> anyhow::Result<RegistryMap>;
    /// Replace the snapshot with `entries`.
    fn save(&self, entries: &RegistryMap) -> anyhow::Result<()>;
}

/// Snapshot kept in memory; for tests and ephemeral stores.
#[derive(Default)]
pub struct MemorySnapshot {
    entries: Mutex<RegistryMap>,
}

impl MemorySnapshot {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RegistrySnapshot for MemorySnapshot {
    fn load(&self) -> anyhow::Result<RegistryMap> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| anyhow!("registry snapshot lock poisoned"))?;
        Ok(entries.clone())
    }

    fn save(&self, entries: &RegistryMap) -> anyhow::Result<()> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|_| anyhow!("registry snapshot lock poisoned"))?;
        *guard = entries.clone();
        Ok(())
    }
}

/// In-memory view of the registry backed by a snapshot.
pub struct EquipmentRegistry {
    entries: RegistryMap,
    snapshot: Box<dyn RegistrySnapshot>,
}

impl EquipmentRegistry {
    pub fn open(snapshot: Box<dyn RegistrySnapshot>) -> Result<Self> {
        let entries = snapshot.load().map_err(StoreError::Persistence)?;
        Ok(Self { entries, snapshot })
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn entry(&self, id: &str) -> Option<&RegistryEntry> {
        self.entries.get(id)
    }

    pub fn get(&self, id: &str) -> Option<Equipment> {
        self.entries.get(id).map(|e| e.to_equipment(id))
    }

    /// All entries, ordered by equipment id.
    pub fn list(&self) -> Vec<Equipment> {
        self.entries
            .iter()
            .map(|(id, e)| e.to_equipment(id))
            .collect()
    }

    pub fn ids(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The equipment already using `collection_name`, if any.
    pub fn owner_of_collection(&self, collection_name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(_, e)| e.collection_name == collection_name)
            .map(|(id, _)| id.as_str())
    }

    pub fn insert(&mut self, id: &str, entry: RegistryEntry) -> Result<()> {
        if self.entries.contains_key(id) {
            return Err(StoreError::AlreadyExists(id.to_string()));
        }
        self.entries.insert(id.to_string(), entry);
        if let Err(e) = self.persist() {
            self.entries.remove(id);
            return Err(e);
        }
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> Result<RegistryEntry> {
        let entry = self
            .entries
            .remove(id)
            .ok_or_else(|| StoreError::NotRegistered(id.to_string()))?;
        if let Err(e) = self.persist() {
            self.entries.insert(id.to_string(), entry);
            return Err(e);
        }
        Ok(entry)
    }

    /// Set the cached chunk count and bump the manual count by `manual_delta`.
    pub fn update_counts(&mut self, id: &str, chunk_count: u64, manual_delta: u64) -> Result<()> {
        let entry = self
            .entries
            .get_mut(id)
            .ok_or_else(|| StoreError::NotRegistered(id.to_string()))?;
        let previous = (entry.chunk_count, entry.manual_count);
        entry.chunk_count = chunk_count;
        entry.manual_count += manual_delta;

        if let Err(e) = self.persist() {
            if let Some(entry) = self.entries.get_mut(id) {
                (entry.chunk_count, entry.manual_count) = previous;
            }
            return Err(e);
        }
        Ok(())
    }

    fn persist(&self) -> Result<()> {
        self.snapshot
            .save(&self.entries)
            .map_err(StoreError::Persistence)
    }
}
