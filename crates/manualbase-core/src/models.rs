//! Core data models used throughout manualbase.
//!
//! These types represent the segments, chunks, equipment entries, and
//! retrieval hits that flow through the ingestion and retrieval pipeline.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Open provenance map carried with every chunk (e.g. `table_index`).
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// How a piece of manual content was extracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkKind {
    Text,
    Table,
    ImageOcr,
    DiagramOcr,
}

impl ChunkKind {
    pub const ALL: [ChunkKind; 4] = [
        ChunkKind::Text,
        ChunkKind::Table,
        ChunkKind::ImageOcr,
        ChunkKind::DiagramOcr,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkKind::Text => "text",
            ChunkKind::Table => "table",
            ChunkKind::ImageOcr => "image_ocr",
            ChunkKind::DiagramOcr => "diagram_ocr",
        }
    }
}

impl fmt::Display for ChunkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChunkKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(ChunkKind::Text),
            "table" => Ok(ChunkKind::Table),
            "image_ocr" => Ok(ChunkKind::ImageOcr),
            "diagram_ocr" => Ok(ChunkKind::DiagramOcr),
            other => Err(format!(
                "unknown chunk kind '{}': expected text, table, image_ocr, or diagram_ocr",
                other
            )),
        }
    }
}

/// One unit of extracted content, as produced by the extraction collaborator.
///
/// Plain text is keyed by page; tables additionally by `table_index`;
/// OCR'd images and diagrams by `image_index`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub page: u32,
    pub text: String,
    #[serde(default = "default_segment_kind")]
    pub kind: ChunkKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_index: Option<u32>,
}

fn default_segment_kind() -> ChunkKind {
    ChunkKind::Text
}

impl Segment {
    pub fn text(page: u32, text: impl Into<String>) -> Self {
        Self {
            page,
            text: text.into(),
            kind: ChunkKind::Text,
            table_index: None,
            image_index: None,
        }
    }

    /// Provenance extras copied into the metadata of every chunk cut from
    /// this segment.
    pub fn metadata(&self) -> Metadata {
        let mut meta = Metadata::new();
        if let Some(i) = self.table_index {
            meta.insert("table_index".to_string(), i.into());
        }
        if let Some(i) = self.image_index {
            meta.insert("image_index".to_string(), i.into());
        }
        meta
    }
}

/// A bounded, identity-stable unit of manual text.
///
/// `id` is derived from provenance and a prefix of `text` by
/// [`chunk_id`](crate::identity::chunk_id), so re-ingesting the same
/// manual overwrites instead of duplicating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub text: String,
    pub source_file: String,
    pub page_number: u32,
    pub kind: ChunkKind,
    pub equipment_id: String,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Chunk {
    /// Build a chunk and derive its identifier.
    pub fn new(
        equipment_id: &str,
        source_file: &str,
        page_number: u32,
        kind: ChunkKind,
        text: impl Into<String>,
    ) -> Self {
        let text = text.into();
        Self {
            id: crate::identity::chunk_id(equipment_id, source_file, page_number, &text),
            text,
            source_file: source_file.to_string(),
            page_number,
            kind,
            equipment_id: equipment_id.to_string(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// A registered knowledge base and its cached counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Equipment {
    pub equipment_id: String,
    pub name: String,
    pub description: String,
    pub collection_name: String,
    pub manual_count: u64,
    pub chunk_count: u64,
}

/// Summary of one equipment's backing collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionStats {
    pub equipment_id: String,
    pub name: String,
    pub collection_name: String,
    pub total_chunks: u64,
    pub manual_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parse_and_display() {
        for kind in ChunkKind::ALL {
            assert_eq!(kind.as_str().parse::<ChunkKind>().unwrap(), kind);
            assert_eq!(kind.to_string(), kind.as_str());
        }
        assert!("photo".parse::<ChunkKind>().is_err());
    }

    #[test]
    fn test_kind_serde_snake_case() {
        let json = serde_json::to_string(&ChunkKind::DiagramOcr).unwrap();
        assert_eq!(json, "\"diagram_ocr\"");
    }

    #[test]
    fn test_segment_defaults_to_text() {
        let seg: Segment = serde_json::from_str(r#"{"page": 3, "text": "hi"}"#).unwrap();
        assert_eq!(seg.kind, ChunkKind::Text);
        assert!(seg.metadata().is_empty());
    }

    #[test]
    fn test_segment_metadata_carries_indices() {
        let seg: Segment = serde_json::from_str(
            r#"{"page": 2, "text": "| a | b |", "kind": "table", "table_index": 1}"#,
        )
        .unwrap();
        let meta = seg.metadata();
        assert_eq!(meta.get("table_index"), Some(&serde_json::json!(1)));
        assert!(!meta.contains_key("image_index"));
    }
}
