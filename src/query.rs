//! `mbase query`: nearest chunks of one equipment for a question.

use anyhow::Result;

use manualbase_core::models::ChunkKind;
use manualbase_core::search::{build_context, RetrievalHit};

use crate::config::Config;
use crate::store::open_store;

/// How query results are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOutput {
    Listing,
    Context,
    Json,
}

pub async fn run_query(
    config: &Config,
    equipment_id: &str,
    question: &str,
    k: Option<usize>,
    kinds: &[ChunkKind],
    output: QueryOutput,
) -> Result<()> {
    let store = open_store(config).await?;
    let k = k.unwrap_or(config.retrieval.default_k);
    let filter = (!kinds.is_empty()).then_some(kinds);

    let hits = if question.trim().is_empty() {
        // Nothing to embed, but an unknown equipment is still an error
        store.count(equipment_id).await?;
        Vec::new()
    } else {
        store.query(equipment_id, question, k, filter).await?
    };

    match output {
        QueryOutput::Json => println!("{}", serde_json::to_string_pretty(&hits)?),
        QueryOutput::Context => println!("{}", build_context(&hits)),
        QueryOutput::Listing => print_listing(&hits),
    }
    Ok(())
}

fn print_listing(hits: &[RetrievalHit]) {
    if hits.is_empty() {
        println!("No results.");
        return;
    }

    for (i, hit) in hits.iter().enumerate() {
        println!(
            "{}. [{:.4}] {} p.{} ({})",
            i + 1,
            hit.distance,
            hit.source_file,
            hit.page_number,
            hit.kind
        );
        println!("    relevance: {:.1}%", hit.relevance());
        println!("    excerpt: \"{}\"", excerpt(&hit.text, 240));
        println!();
    }
}

fn excerpt(text: &str, max_chars: usize) -> String {
    let flat = text.replace('\n', " ");
    let flat = flat.trim();
    if flat.chars().count() <= max_chars {
        return flat.to_string();
    }
    let cut: String = flat.chars().take(max_chars).collect();
    format!("{}...", cut.trim_end())
}
