//! Wiring of the configured backend, embedder, and registry file into an
//! [`EquipmentStore`].

use anyhow::Result;
use std::sync::Arc;

use manualbase_core::registry::{RegistryMap, RegistrySnapshot};
use manualbase_core::store::EquipmentStore;

use crate::config::Config;
use crate::db;
use crate::embedding::create_embedder;
use crate::migrate;
use crate::registry_file::JsonFileSnapshot;
use crate::sqlite_backend::SqliteBackend;

/// Open the store described by `config`, creating the database schema and
/// storage directory when missing.
pub async fn open_store(config: &Config) -> Result<EquipmentStore> {
    let pool = db::connect(config).await?;
    migrate::migrate_pool(&pool).await?;

    let backend = Arc::new(SqliteBackend::new(pool));
    let embedder = create_embedder(&config.embedding)?;
    let snapshot = Box::new(JsonFileSnapshot::new(config.storage.registry_path()));

    let store = EquipmentStore::open(backend, embedder, snapshot, config.ingest.batch_size)?;
    Ok(store)
}

/// Create the storage directory, database schema, and an empty registry
/// file. Safe to run repeatedly; existing data is left untouched.
pub async fn init_storage(config: &Config) -> Result<()> {
    migrate::run_migrations(config).await?;

    let snapshot = JsonFileSnapshot::new(config.storage.registry_path());
    if !snapshot.path().exists() {
        snapshot.save(&RegistryMap::new())?;
    }
    Ok(())
}
