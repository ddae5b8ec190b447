//! Storage statistics and health overview.
//!
//! `mbase stats` summarizes what is stored: database size, registered
//! equipment, and per-collection chunk counts next to the cached counters
//! from the registry, so drift between the two is easy to spot.

use anyhow::Result;

use manualbase_core::models::CollectionStats;

use crate::config::Config;
use crate::store::open_store;

/// Run the stats command for one equipment or for all of them.
pub async fn run_stats(config: &Config, equipment_id: Option<&str>, json: bool) -> Result<()> {
    let store = open_store(config).await?;

    if let Some(id) = equipment_id {
        let stats = store.collection_stats(id).await?;
        if json {
            println!("{}", serde_json::to_string_pretty(&stats)?);
        } else {
            print_collection(&stats);
        }
        return Ok(());
    }

    let equipment = store.list().await;
    let mut rows: Vec<(CollectionStats, u64)> = Vec::with_capacity(equipment.len());
    for e in &equipment {
        let stats = store.collection_stats(&e.equipment_id).await?;
        rows.push((stats, e.chunk_count));
    }

    if json {
        let all: Vec<&CollectionStats> = rows.iter().map(|(s, _)| s).collect();
        println!("{}", serde_json::to_string_pretty(&all)?);
        return Ok(());
    }

    let db_path = config.storage.database_path();
    let db_size = std::fs::metadata(&db_path).map(|m| m.len()).unwrap_or(0);
    let total_chunks: u64 = rows.iter().map(|(s, _)| s.total_chunks).sum();

    println!("manualbase storage stats");
    println!("========================");
    println!();
    println!("  Database:    {}", db_path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!("  Registry:    {}", config.storage.registry_path().display());
    println!("  Embedding:   {}", store.embedder().model_name());
    println!();
    println!("  Equipment:   {}", rows.len());
    println!("  Chunks:      {}", total_chunks);

    if !rows.is_empty() {
        println!();
        println!(
            "  {:<24} {:<28} {:>8} {:>8} {:>8}",
            "EQUIPMENT", "COLLECTION", "MANUALS", "CHUNKS", "CACHED"
        );
        println!("  {}", "-".repeat(80));
        for (s, cached) in &rows {
            let marker = if *cached != s.total_chunks { " *" } else { "" };
            println!(
                "  {:<24} {:<28} {:>8} {:>8} {:>8}{}",
                s.equipment_id, s.collection_name, s.manual_count, s.total_chunks, cached, marker
            );
        }
        if rows.iter().any(|(s, cached)| *cached != s.total_chunks) {
            println!();
            println!("  * cached chunk count differs from the stored count");
        }
    }

    println!();
    Ok(())
}

fn print_collection(stats: &CollectionStats) {
    println!("{} ({})", stats.equipment_id, stats.name);
    println!("  collection:  {}", stats.collection_name);
    println!("  chunks:      {}", stats.total_chunks);
    println!("  manuals:     {}", stats.manual_count);
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.00 GB");
    }
}
