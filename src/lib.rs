//! # manualbase
//!
//! An equipment-isolated chunk store for question answering over technical
//! manuals.
//!
//! Extracted manual text arrives as JSON segment files, is split into
//! identity-stable chunks, embedded, and written into one collection per
//! registered equipment. Questions are answered with the nearest chunks of a
//! single equipment, never mixing knowledge bases.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌─────────────┐   ┌────────────────────┐
//! │  Segments  │──▶│ Chunk+Embed │──▶│ SQLite collections │
//! │   (JSON)   │   │   (core)    │   │ + registry JSON    │
//! └────────────┘   └─────────────┘   └─────────┬──────────┘
//!                                              │
//!                                              ▼
//!                                       ┌─────────────┐
//!                                       │ mbase query │
//!                                       └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! mbase init
//! mbase equipment register main_engine "Main Engine"
//! mbase ingest main_engine ./segments/engine.pdf.json
//! mbase query main_engine "lube oil pressure alarm" --context
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`logging`] | Tracing subscriber setup |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_backend`] | SQLite collection backend |
//! | [`registry_file`] | Atomic JSON registry snapshot |
//! | [`embedding`] | Embedding providers |
//! | [`store`] | Store wiring from config |
//! | [`ingest`] | Segment-file ingestion |
//! | [`equipment`] | Equipment commands |
//! | [`query`] | Retrieval command |
//! | [`stats`] | Storage statistics |

pub mod config;
pub mod db;
pub mod embedding;
pub mod equipment;
pub mod ingest;
pub mod logging;
pub mod migrate;
pub mod query;
pub mod registry_file;
pub mod sqlite_backend;
pub mod stats;
pub mod store;
