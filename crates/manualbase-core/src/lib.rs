//! # manualbase core
//!
//! Equipment-isolated chunk store: data models, chunking, chunk identity,
//! the equipment registry, the collection backend abstraction with an
//! in-memory implementation, retrieval formatting, and the
//! [`EquipmentStore`](store::EquipmentStore) façade tying them together.
//!
//! This crate does no filesystem, SQL, or HTTP work. The `manualbase`
//! application crate supplies the SQLite backend, the registry file, and
//! the network embedding providers.
//!
//! ```rust
//! use std::sync::Arc;
//! use manualbase_core::embedding::HashingEmbedder;
//! use manualbase_core::models::{Chunk, ChunkKind};
//! use manualbase_core::store::EquipmentStore;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let store = EquipmentStore::in_memory(Arc::new(HashingEmbedder::new(64))).unwrap();
//! store.register("main_engine_01", "Main Engine", "").await.unwrap();
//!
//! let chunk = Chunk::new("main_engine_01", "engine.pdf", 12, ChunkKind::Text,
//!     "Check the lube oil pressure before start.");
//! store.add_chunks("main_engine_01", &[chunk], Some("engine.pdf")).await.unwrap();
//!
//! let hits = store.query("main_engine_01", "oil pressure", 3, None).await.unwrap();
//! assert_eq!(hits[0].page_number, 12);
//! # }
//! ```

pub mod backend;
pub mod chunk;
pub mod collection;
pub mod embedding;
pub mod error;
pub mod identity;
pub mod models;
pub mod registry;
pub mod search;
pub mod store;

pub use error::{Result, StoreError};
