//! TOML configuration for the `mbase` binary and library entry points.
//!
//! Every section and field has a serde default, so an empty file is a valid
//! configuration that stores data under `./data` with the `disabled`
//! embedding provider.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use manualbase_core::chunk::{ChunkOptions, ChunkStrategy};
use manualbase_core::collection::DEFAULT_BATCH_SIZE;

/// Registry snapshot file name inside `storage.dir`.
pub const REGISTRY_FILE: &str = "equipment_registry.json";
/// SQLite database file name inside `storage.dir`.
pub const DATABASE_FILE: &str = "manualbase.sqlite";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_storage_dir")]
    pub dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: default_storage_dir(),
        }
    }
}

impl StorageConfig {
    pub fn database_path(&self) -> PathBuf {
        self.dir.join(DATABASE_FILE)
    }

    pub fn registry_path(&self) -> PathBuf {
        self.dir.join(REGISTRY_FILE)
    }
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from("./data")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub overlap: usize,
    #[serde(default)]
    pub strategy: ChunkStrategy,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            size: default_chunk_size(),
            overlap: default_chunk_overlap(),
            strategy: ChunkStrategy::default(),
        }
    }
}

impl ChunkingConfig {
    pub fn options(&self) -> ChunkOptions {
        ChunkOptions {
            size: self.size,
            overlap: self.overlap,
            strategy: self.strategy,
        }
    }
}

fn default_chunk_size() -> usize {
    1000
}
fn default_chunk_overlap() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct IngestConfig {
    /// Chunks embedded and written per collection batch.
    #[serde(default = "default_ingest_batch_size")]
    pub batch_size: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: default_ingest_batch_size(),
        }
    }
}

fn default_ingest_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_k")]
    pub default_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_k: default_k(),
        }
    }
}

fn default_k() -> usize {
    8
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
    /// Texts per provider call (local model batch size).
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "warn".to_string()
}

/// Read, parse, and validate a configuration file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Check cross-field constraints that serde defaults cannot express.
pub fn validate(config: &Config) -> Result<()> {
    // Validate chunking
    if config.chunking.size == 0 {
        bail!("chunking.size must be > 0");
    }
    if config.chunking.overlap >= config.chunking.size {
        bail!(
            "chunking.overlap ({}) must be smaller than chunking.size ({})",
            config.chunking.overlap,
            config.chunking.size
        );
    }

    // Validate ingest and retrieval
    if config.ingest.batch_size == 0 {
        bail!("ingest.batch_size must be >= 1");
    }
    if config.retrieval.default_k == 0 {
        bail!("retrieval.default_k must be >= 1");
    }

    // Validate embedding
    match config.embedding.provider.as_str() {
        "disabled" | "hash" | "local" => {}
        "openai" | "ollama" => {
            if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
                bail!(
                    "embedding.dims must be > 0 when provider is '{}'",
                    config.embedding.provider
                );
            }
            if config.embedding.model.is_none() {
                bail!(
                    "embedding.model must be specified when provider is '{}'",
                    config.embedding.provider
                );
            }
        }
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, hash, openai, ollama, or local.",
            other
        ),
    }
    if config.embedding.dims == Some(0) {
        bail!("embedding.dims must be > 0");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_str: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_str)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse("").unwrap();
        assert_eq!(config.chunking.size, 1000);
        assert_eq!(config.chunking.overlap, 200);
        assert_eq!(config.chunking.strategy, ChunkStrategy::Recursive);
        assert_eq!(config.ingest.batch_size, 500);
        assert_eq!(config.retrieval.default_k, 8);
        assert_eq!(config.embedding.provider, "disabled");
        assert_eq!(config.logging.level, "warn");
        assert_eq!(
            config.storage.registry_path(),
            PathBuf::from("./data").join(REGISTRY_FILE)
        );
    }

    #[test]
    fn test_full_config() {
        let config = parse(
            r#"
            [storage]
            dir = "/var/lib/manualbase"

            [chunking]
            size = 500
            overlap = 50
            strategy = "sliding_window"

            [embedding]
            provider = "ollama"
            model = "nomic-embed-text"
            dims = 768
            url = "http://gpu-box:11434"

            [logging]
            level = "manualbase=debug"
            "#,
        )
        .unwrap();
        assert_eq!(config.chunking.strategy, ChunkStrategy::SlidingWindow);
        assert_eq!(config.embedding.dims, Some(768));
        assert_eq!(
            config.storage.database_path(),
            PathBuf::from("/var/lib/manualbase/manualbase.sqlite")
        );
    }

    #[test]
    fn test_overlap_must_be_smaller_than_size() {
        let err = parse("[chunking]\nsize = 100\noverlap = 100\n").unwrap_err();
        assert!(err.to_string().contains("overlap"));
    }

    #[test]
    fn test_zero_values_rejected() {
        assert!(parse("[chunking]\nsize = 0\noverlap = 0\n").is_err());
        assert!(parse("[ingest]\nbatch_size = 0\n").is_err());
        assert!(parse("[retrieval]\ndefault_k = 0\n").is_err());
    }

    #[test]
    fn test_remote_provider_requires_model_and_dims() {
        assert!(parse("[embedding]\nprovider = \"openai\"\n").is_err());
        assert!(parse("[embedding]\nprovider = \"openai\"\ndims = 1536\n").is_err());
        assert!(parse(
            "[embedding]\nprovider = \"openai\"\nmodel = \"text-embedding-3-small\"\ndims = 1536\n"
        )
        .is_ok());
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let err = parse("[embedding]\nprovider = \"magic\"\n").unwrap_err();
        assert!(err.to_string().contains("Unknown embedding provider"));
    }

    #[test]
    fn test_load_config_reports_missing_file() {
        let err = load_config(Path::new("/nonexistent/mbase.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
