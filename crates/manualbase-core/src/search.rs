//! Retrieval results and the context block handed to answer generation.
//!
//! Ordering is decided by the backend's cosine distance. [`RetrievalHit::relevance`]
//! is a display percentage derived from it and is never used to sort.

use serde::Serialize;

use crate::backend::CollectionHit;
use crate::models::ChunkKind;

/// Returned by [`build_context`] when nothing was retrieved.
pub const NO_CONTEXT: &str = "No relevant manual data found for this query.";

const BANNER_WIDTH: usize = 60;
const BANNER_TITLE: &str = "RETRIEVED MANUAL DATA (use ONLY this data to answer)";

/// One retrieved chunk, in ascending distance order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalHit {
    pub text: String,
    pub source_file: String,
    pub page_number: u32,
    pub kind: ChunkKind,
    /// Cosine distance rounded to 4 decimals.
    pub distance: f64,
}

impl RetrievalHit {
    /// `max(0, (1 - distance) * 100)` rounded to one decimal.
    pub fn relevance(&self) -> f64 {
        let pct = ((1.0 - self.distance) * 1000.0).round() / 10.0;
        pct.max(0.0)
    }
}

impl From<CollectionHit> for RetrievalHit {
    fn from(hit: CollectionHit) -> Self {
        Self {
            text: hit.document,
            source_file: hit.metadata.source_file,
            page_number: hit.metadata.page_number,
            kind: hit.metadata.kind,
            distance: round_distance(hit.distance),
        }
    }
}

fn round_distance(distance: f32) -> f64 {
    (f64::from(distance) * 10_000.0).round() / 10_000.0
}

/// Render hits as the excerpt block used as grounding for an answer.
pub fn build_context(hits: &[RetrievalHit]) -> String {
    if hits.is_empty() {
        return NO_CONTEXT.to_string();
    }

    let rule = "=".repeat(BANNER_WIDTH);
    let mut parts = vec![rule.clone(), BANNER_TITLE.to_string(), rule.clone()];

    for (i, hit) in hits.iter().enumerate() {
        parts.push(format!(
            "\n--- Excerpt {} [{}] (Source: {}, Page: {}, Relevance: {:.1}%) ---",
            i + 1,
            hit.kind.as_str().to_uppercase(),
            hit.source_file,
            hit.page_number,
            hit.relevance()
        ));
        parts.push(hit.text.clone());
    }

    parts.push(format!("\n{}", rule));
    parts.join("\n")
}
