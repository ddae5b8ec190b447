//! Registry snapshot stored as a pretty-printed JSON file.
//!
//! Writes go to a temporary file in the same directory which is then
//! renamed over the target, so readers see either the old or the new
//! registry and never a torn write.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::NamedTempFile;

use manualbase_core::registry::{RegistryMap, RegistrySnapshot};

pub struct JsonFileSnapshot {
    path: PathBuf,
}

impl JsonFileSnapshot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RegistrySnapshot for JsonFileSnapshot {
    fn load(&self) -> Result<RegistryMap> {
        if !self.path.exists() {
            return Ok(RegistryMap::new());
        }
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read registry {}", self.path.display()))?;
        if content.trim().is_empty() {
            return Ok(RegistryMap::new());
        }
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse registry {}", self.path.display()))
    }

    fn save(&self, entries: &RegistryMap) -> Result<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let json = serde_json::to_string_pretty(entries)?;
        let mut tmp = NamedTempFile::new_in(dir)
            .with_context(|| format!("Failed to create temp file in {}", dir.display()))?;
        tmp.write_all(json.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use manualbase_core::registry::RegistryEntry;
    use tempfile::TempDir;

    fn entry() -> RegistryEntry {
        RegistryEntry {
            name: "Main Engine".to_string(),
            description: "MAN B&W 6S50".to_string(),
            collection_name: "equip_main_engine".to_string(),
            manual_count: 2,
            chunk_count: 340,
        }
    }

    #[test]
    fn test_missing_file_is_empty_registry() {
        let tmp = TempDir::new().unwrap();
        let snapshot = JsonFileSnapshot::new(tmp.path().join("equipment_registry.json"));
        assert!(snapshot.load().unwrap().is_empty());
    }

    #[test]
    fn test_save_then_load() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("equipment_registry.json");
        let snapshot = JsonFileSnapshot::new(&path);

        let mut entries = RegistryMap::new();
        entries.insert("main_engine".to_string(), entry());
        snapshot.save(&entries).unwrap();

        assert_eq!(snapshot.load().unwrap(), entries);

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["main_engine"]["chunk_count"], 340);
        assert_eq!(raw["main_engine"]["collection_name"], "equip_main_engine");
    }

    #[test]
    fn test_save_replaces_previous_snapshot() {
        let tmp = TempDir::new().unwrap();
        let snapshot = JsonFileSnapshot::new(tmp.path().join("equipment_registry.json"));

        let mut entries = RegistryMap::new();
        entries.insert("a".to_string(), entry());
        entries.insert("b".to_string(), entry());
        snapshot.save(&entries).unwrap();
        entries.remove("a");
        snapshot.save(&entries).unwrap();

        let loaded = snapshot.load().unwrap();
        assert_eq!(loaded.keys().collect::<Vec<_>>(), vec!["b"]);
        let leftovers = fs::read_dir(tmp.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("equipment_registry.json");
        fs::write(&path, "{ not json").unwrap();
        let err = JsonFileSnapshot::new(&path).load().unwrap_err();
        assert!(err.to_string().contains("Failed to parse registry"));
    }
}
