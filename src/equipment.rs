//! `mbase equipment` and `mbase reset` commands.

use anyhow::{bail, Result};

use manualbase_core::models::Equipment;

use crate::config::Config;
use crate::store::open_store;

pub async fn run_register(config: &Config, id: &str, name: &str, description: &str) -> Result<()> {
    let store = open_store(config).await?;
    let equipment = store.register(id, name, description).await?;
    println!(
        "Registered '{}' ({}) -> collection {}",
        equipment.equipment_id, equipment.name, equipment.collection_name
    );
    Ok(())
}

pub async fn run_list(config: &Config, json: bool) -> Result<()> {
    let store = open_store(config).await?;
    let all = store.list().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&all)?);
        return Ok(());
    }

    if all.is_empty() {
        println!("No equipment registered.");
        return Ok(());
    }

    println!(
        "{:<24} {:<28} {:>8} {:>8}",
        "ID", "NAME", "MANUALS", "CHUNKS"
    );
    println!("{}", "-".repeat(71));
    for e in &all {
        println!(
            "{:<24} {:<28} {:>8} {:>8}",
            e.equipment_id, e.name, e.manual_count, e.chunk_count
        );
    }
    Ok(())
}

pub async fn run_show(config: &Config, id: &str, json: bool) -> Result<()> {
    let store = open_store(config).await?;
    let Some(equipment) = store.get(id).await else {
        bail!("Equipment '{}' not registered. Register it first.", id);
    };
    let stats = store.collection_stats(id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&equipment)?);
        return Ok(());
    }

    print_equipment(&equipment);
    println!("  stored chunks:   {}", stats.total_chunks);
    Ok(())
}

fn print_equipment(e: &Equipment) {
    println!("{}", e.equipment_id);
    println!("  name:            {}", e.name);
    if !e.description.is_empty() {
        println!("  description:     {}", e.description);
    }
    println!("  collection:      {}", e.collection_name);
    println!("  manuals:         {}", e.manual_count);
    println!("  chunks (cached): {}", e.chunk_count);
}

pub async fn run_delete(config: &Config, id: &str) -> Result<()> {
    let store = open_store(config).await?;
    store.delete(id).await?;
    println!("Deleted '{}'.", id);
    Ok(())
}

pub async fn run_reset(config: &Config, yes: bool) -> Result<()> {
    if !yes {
        bail!("Refusing to delete all equipment without --yes");
    }
    let store = open_store(config).await?;
    let removed = store.reset_all().await?;
    println!("Removed {} equipment.", removed);
    Ok(())
}
