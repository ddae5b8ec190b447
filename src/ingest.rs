//! Segment-file ingestion.
//!
//! The extraction step (PDF text, tables, OCR) runs elsewhere and leaves
//! its output as JSON segment files. Two layouts are accepted:
//!
//! ```json
//! [{"page": 1, "text": "...", "kind": "text"}]
//! ```
//!
//! ```json
//! {"source_file": "engine.pdf", "segments": [{"page": 1, "text": "..."}]}
//! ```
//!
//! Without an explicit `source_file` the file name minus its `.json`
//! extension is used (`engine.pdf.json` → `engine.pdf`). A directory ingests
//! every `*.json` file below it in sorted path order.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;
use walkdir::WalkDir;

use manualbase_core::chunk::{chunk_segments, ChunkOptions, ProcessingStats};
use manualbase_core::models::{Chunk, Segment};
use manualbase_core::store::EquipmentStore;
use manualbase_core::StoreError;

use crate::config::Config;
use crate::store::open_store;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SegmentFile {
    Bare(Vec<Segment>),
    Wrapped {
        #[serde(default)]
        source_file: Option<String>,
        segments: Vec<Segment>,
    },
}

/// One segment file, parsed.
#[derive(Debug, Clone)]
pub struct SegmentSource {
    pub path: PathBuf,
    pub source_file: String,
    pub segments: Vec<Segment>,
}

/// Per-file ingestion outcome.
#[derive(Debug, Clone)]
pub struct FileReport {
    pub source_file: String,
    pub chunks_prepared: usize,
    pub chunks_written: usize,
}

#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    pub files: Vec<FileReport>,
    pub stats: ProcessingStats,
}

impl IngestReport {
    pub fn chunks_written(&self) -> usize {
        self.files.iter().map(|f| f.chunks_written).sum()
    }
}

/// Parse one segment file. `source_override` replaces the embedded or
/// derived source file name.
pub fn load_segment_file(path: &Path, source_override: Option<&str>) -> Result<SegmentSource> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read segment file: {}", path.display()))?;
    let parsed: SegmentFile = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse segment file: {}", path.display()))?;

    let (embedded, segments) = match parsed {
        SegmentFile::Bare(segments) => (None, segments),
        SegmentFile::Wrapped {
            source_file,
            segments,
        } => (source_file, segments),
    };

    let source_file = source_override
        .map(str::to_string)
        .or(embedded)
        .unwrap_or_else(|| default_source_name(path));

    Ok(SegmentSource {
        path: path.to_path_buf(),
        source_file,
        segments,
    })
}

fn default_source_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

/// The segment files named by `path`: the file itself, or every `*.json`
/// file below a directory, sorted.
pub fn collect_segment_files(path: &Path) -> Result<Vec<PathBuf>> {
    if !path.exists() {
        bail!("Path does not exist: {}", path.display());
    }
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(path) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let is_json = entry
            .path()
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

/// Chunk a parsed segment file for `equipment_id`.
pub fn prepare_chunks(equipment_id: &str, source: &SegmentSource, opts: &ChunkOptions) -> Vec<Chunk> {
    chunk_segments(equipment_id, &source.source_file, &source.segments, opts)
}

/// Chunk and store every segment file under `path`.
pub async fn ingest_path(
    store: &EquipmentStore,
    equipment_id: &str,
    path: &Path,
    source_override: Option<&str>,
    opts: &ChunkOptions,
) -> Result<IngestReport> {
    if store.get(equipment_id).await.is_none() {
        return Err(StoreError::NotRegistered(equipment_id.to_string()).into());
    }

    let files = collect_segment_files(path)?;
    if source_override.is_some() && files.len() > 1 {
        bail!("--source-file only applies when ingesting a single segment file");
    }

    let mut report = IngestReport::default();
    let mut all_chunks = Vec::new();

    for file in &files {
        let source = load_segment_file(file, source_override)?;
        let chunks = prepare_chunks(equipment_id, &source, opts);
        let written = store
            .add_chunks(equipment_id, &chunks, Some(&source.source_file))
            .await?;

        info!(
            equipment = equipment_id,
            file = %file.display(),
            prepared = chunks.len(),
            written,
            "ingested segment file"
        );
        report.files.push(FileReport {
            source_file: source.source_file,
            chunks_prepared: chunks.len(),
            chunks_written: written,
        });
        all_chunks.extend(chunks);
    }

    report.stats = ProcessingStats::from_chunks(&all_chunks);
    Ok(report)
}

/// `mbase ingest`: ingest segment files and print a summary.
pub async fn run_ingest(
    config: &Config,
    equipment_id: &str,
    path: &Path,
    source_file: Option<&str>,
    dry_run: bool,
) -> Result<()> {
    let opts = config.chunking.options();

    if dry_run {
        let mut chunks = Vec::new();
        for file in collect_segment_files(path)? {
            let source = load_segment_file(&file, source_file)?;
            chunks.extend(prepare_chunks(equipment_id, &source, &opts));
        }
        println!("ingest {} (dry-run)", equipment_id);
        print_stats(&ProcessingStats::from_chunks(&chunks));
        return Ok(());
    }

    let store = open_store(config).await?;
    let report = ingest_path(&store, equipment_id, path, source_file, &opts).await?;

    println!("ingest {}", equipment_id);
    for file in &report.files {
        println!(
            "  {:<40} {:>6} chunks ({} written)",
            file.source_file, file.chunks_prepared, file.chunks_written
        );
    }
    print_stats(&report.stats);
    println!("  total written: {}", report.chunks_written());
    println!("ok");
    Ok(())
}

fn print_stats(stats: &ProcessingStats) {
    println!("  files: {}", stats.files_processed);
    println!("  pages covered: {}", stats.pages_covered);
    println!("  chunks: {}", stats.total_chunks);
    println!("  characters: {}", stats.total_characters);
    println!("  avg chunk size: {}", stats.avg_chunk_size);
    for (kind, count) in &stats.chunks_by_kind {
        println!("    {:<12} {}", kind.as_str(), count);
    }
}
