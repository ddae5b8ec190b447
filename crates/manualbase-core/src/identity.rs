//! Deterministic naming: chunk identifiers and backend collection names.
//!
//! Chunk ids are the upsert key of the collection store. They hash the
//! owning equipment, the source file, the page, and the first
//! [`ID_PREFIX_CHARS`] characters of the text, so re-processing a manual
//! overwrites the chunks it produced last time.

use sha2::{Digest, Sha256};

/// Number of leading text characters that participate in the chunk hash.
pub const ID_PREFIX_CHARS: usize = 100;

/// Number of hex digits kept from the SHA-256 digest.
pub const ID_HASH_LEN: usize = 12;

/// Prefix applied to every derived collection name.
pub const COLLECTION_PREFIX: &str = "equip_";

const MIN_COLLECTION_NAME: usize = 3;
const MAX_COLLECTION_NAME: usize = 63;

/// Derive the stable identifier of a chunk.
///
/// The result is `"{equipment_id}_{hash}"`, where `hash` is a 12-digit hex
/// prefix of SHA-256 over the provenance and the first 100 characters of
/// `text`.
///
/// # Example
///
/// ```rust
/// use manualbase_core::identity::chunk_id;
///
/// let a = chunk_id("pump_7", "pump.pdf", 4, "Check seal wear.");
/// let b = chunk_id("pump_7", "pump.pdf", 4, "Check seal wear.");
/// assert_eq!(a, b);
/// assert!(a.starts_with("pump_7_"));
/// ```
pub fn chunk_id(equipment_id: &str, source_file: &str, page_number: u32, text: &str) -> String {
    let prefix: String = text.chars().take(ID_PREFIX_CHARS).collect();

    let mut hasher = Sha256::new();
    hasher.update(equipment_id.as_bytes());
    hasher.update(b":");
    hasher.update(source_file.as_bytes());
    hasher.update(b":");
    hasher.update(page_number.to_string().as_bytes());
    hasher.update(b":");
    hasher.update(prefix.as_bytes());
    let digest = format!("{:x}", hasher.finalize());

    format!("{}_{}", equipment_id, &digest[..ID_HASH_LEN])
}

/// Derive a backend-legal collection name for an equipment id.
///
/// Lowercases, maps spaces and dashes to `_`, drops every character that is
/// not an ASCII letter, digit, or underscore, pads to at least 3 and
/// truncates to at most 63 characters.
pub fn collection_name(equipment_id: &str) -> String {
    let safe: String = equipment_id
        .to_lowercase()
        .chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_')
        .collect();

    let mut name = format!("{}{}", COLLECTION_PREFIX, safe);
    if name.len() < MIN_COLLECTION_NAME {
        name.push_str("_db");
    }
    name.truncate(MAX_COLLECTION_NAME);
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_legal(name: &str) -> bool {
        (MIN_COLLECTION_NAME..=MAX_COLLECTION_NAME).contains(&name.len())
            && name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
    }

    #[test]
    fn test_chunk_id_deterministic() {
        let a = chunk_id("main_engine_01", "manual.pdf", 12, "Fuel injector torque");
        let b = chunk_id("main_engine_01", "manual.pdf", 12, "Fuel injector torque");
        assert_eq!(a, b);
        assert_eq!(a.len(), "main_engine_01_".len() + ID_HASH_LEN);
    }

    #[test]
    fn test_chunk_id_varies_with_provenance() {
        let base = chunk_id("e1", "a.pdf", 1, "text");
        assert_ne!(base, chunk_id("e2", "a.pdf", 1, "text"));
        assert_ne!(base, chunk_id("e1", "b.pdf", 1, "text"));
        assert_ne!(base, chunk_id("e1", "a.pdf", 2, "text"));
        assert_ne!(base, chunk_id("e1", "a.pdf", 1, "other"));
    }

    #[test]
    fn test_chunk_id_only_hashes_prefix() {
        let head = "x".repeat(ID_PREFIX_CHARS);
        let a = chunk_id("e1", "a.pdf", 1, &format!("{}tail one", head));
        let b = chunk_id("e1", "a.pdf", 1, &format!("{}tail two", head));
        assert_eq!(a, b);
    }

    #[test]
    fn test_chunk_id_multibyte_prefix() {
        let text = "Überdruckventil ".repeat(20);
        let id = chunk_id("e1", "a.pdf", 1, &text);
        assert!(id.starts_with("e1_"));
    }

    #[test]
    fn test_collection_name_sanitizes() {
        assert_eq!(collection_name("Main Engine-01"), "equip_main_engine_01");
        assert_eq!(collection_name("boiler#2!"), "equip_boiler2");
        assert_eq!(collection_name("Öl-Pumpe"), "equip_l_pumpe");
    }

    #[test]
    fn test_collection_name_truncates() {
        let name = collection_name(&"a".repeat(200));
        assert_eq!(name.len(), MAX_COLLECTION_NAME);
        assert!(is_legal(&name));
    }

    #[test]
    fn test_collection_name_always_legal() {
        for id in ["", "x", "!!!", "ÄÖÜ", "a b c", "MiXeD_Case-9", "\t\n"] {
            let name = collection_name(id);
            assert!(is_legal(&name), "illegal name {:?} for id {:?}", name, id);
        }
    }
}
