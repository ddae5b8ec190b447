//! Embedding providers implementing [`Embedder`].
//!
//! - **[`DisabledEmbedder`]**: every call fails; ingestion and queries
//!   report `EmbeddingUnavailable`.
//! - **`hash`**: the core [`HashingEmbedder`], offline and deterministic.
//! - **[`OpenAIEmbedder`]**: `POST /v1/embeddings` with retry and backoff.
//! - **[`OllamaEmbedder`]**: a local Ollama instance's `/api/embed`.
//! - **`LocalEmbedder`**: fastembed models run in-process (feature
//!   `local-embeddings-fastembed`).
//!
//! # Retry Strategy
//!
//! The OpenAI and Ollama providers use exponential backoff for transient errors:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use manualbase_core::embedding::{Embedder, HashingEmbedder};

use crate::config::EmbeddingConfig;

/// Dimensionality of the `hash` provider when `embedding.dims` is unset.
pub const DEFAULT_HASH_DIMS: usize = 256;

/// Build the provider named by `embedding.provider`.
///
/// | Config Value | Provider |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledEmbedder`] |
/// | `"hash"` | [`HashingEmbedder`] |
/// | `"openai"` | [`OpenAIEmbedder`] |
/// | `"ollama"` | [`OllamaEmbedder`] |
/// | `"local"` | `LocalEmbedder` (feature `local-embeddings-fastembed`) |
///
/// Construction is cheap: the local model is loaded on the first
/// [`embed`](Embedder::embed) call.
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledEmbedder)),
        "hash" => Ok(Arc::new(HashingEmbedder::new(
            config.dims.unwrap_or(DEFAULT_HASH_DIMS),
        ))),
        "openai" => Ok(Arc::new(OpenAIEmbedder::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaEmbedder::new(config)?)),
        #[cfg(feature = "local-embeddings-fastembed")]
        "local" => Ok(Arc::new(LocalEmbedder::new(config)?)),
        #[cfg(not(feature = "local-embeddings-fastembed"))]
        "local" => bail!(
            "Local embedding provider requires --features local-embeddings-fastembed"
        ),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

fn http_client(config: &EmbeddingConfig) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .build()?)
}

fn backoff(attempt: u32) -> Duration {
    Duration::from_secs(1 << (attempt - 1).min(5))
}

// ============ Disabled ============

/// Provider used when `embedding.provider = "disabled"`.
pub struct DisabledEmbedder;

#[async_trait]
impl Embedder for DisabledEmbedder {
    fn model_name(&self) -> &str {
        "disabled"
    }

    fn dims(&self) -> usize {
        0
    }

    async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        bail!("Embedding provider is disabled; set [embedding] provider in the config")
    }
}

// ============ OpenAI ============

/// Embedding provider using the OpenAI API.
///
/// Requires the `OPENAI_API_KEY` environment variable.
pub struct OpenAIEmbedder {
    model: String,
    dims: usize,
    api_key: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAIEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow!("embedding.model required for OpenAI provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow!("embedding.dims required for OpenAI provider"))?;
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow!("OPENAI_API_KEY environment variable not set"))?;

        Ok(Self {
            model,
            dims,
            api_key,
            max_retries: config.max_retries,
            client: http_client(config)?,
        })
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                tokio::time::sleep(backoff(attempt)).await;
            }

            let resp = self
                .client
                .post("https://api.openai.com/v1/embeddings")
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return parse_openai_response(&json);
                    }

                    // Rate limited or server error, retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        warn!(%status, attempt, "OpenAI embedding request failed, retrying");
                        last_err = Some(anyhow!("OpenAI API error {}: {}", status, body_text));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    bail!("OpenAI API error {}: {}", status, body_text);
                }
                Err(e) => {
                    warn!(error = %e, attempt, "OpenAI connection error, retrying");
                    last_err = Some(e.into());
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow!("Embedding failed after retries")))
    }
}

/// Extract `data[].embedding`, ordered by each item's `index`.
fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| anyhow!("Invalid OpenAI response: missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(position);
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| anyhow!("Invalid OpenAI response: missing embedding"))?;
        indexed.push((index, to_f32_vec(embedding)));
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

fn to_f32_vec(values: &[serde_json::Value]) -> Vec<f32> {
    values
        .iter()
        .map(|v| v.as_f64().unwrap_or(0.0) as f32)
        .collect()
}

// ============ Ollama ============

/// Embedding provider using a local Ollama instance.
///
/// Calls `POST {url}/api/embed` (default `http://localhost:11434`).
pub struct OllamaEmbedder {
    model: String,
    dims: usize,
    url: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow!("embedding.model required for Ollama provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow!("embedding.dims required for Ollama provider"))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434".to_string());

        Ok(Self {
            model,
            dims,
            url: url.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
            client: http_client(config)?,
        })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                tokio::time::sleep(backoff(attempt)).await;
            }

            let resp = self
                .client
                .post(format!("{}/api/embed", self.url))
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return parse_ollama_response(&json);
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        warn!(%status, attempt, "Ollama embedding request failed, retrying");
                        last_err = Some(anyhow!("Ollama API error {}: {}", status, body_text));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    bail!("Ollama API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(anyhow!(
                        "Ollama connection error (is Ollama running at {}?): {}",
                        self.url,
                        e
                    ));
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow!("Ollama embedding failed after retries")))
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let embeddings = json
        .get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| anyhow!("Invalid Ollama response: missing embeddings array"))?;

    embeddings
        .iter()
        .map(|embedding| {
            embedding
                .as_array()
                .map(|values| to_f32_vec(values))
                .ok_or_else(|| anyhow!("Invalid Ollama response: embedding is not an array"))
        })
        .collect()
}

// ============ Local (fastembed) ============

/// In-process embedding with a fastembed model.
///
/// The model is downloaded and loaded on the first call to
/// [`embed`](Embedder::embed). Concurrent first callers wait on the same
/// load; a failed load is not remembered, so the next call tries again.
#[cfg(feature = "local-embeddings-fastembed")]
pub struct LocalEmbedder {
    model_name: String,
    dims: usize,
    batch_size: usize,
    model: tokio::sync::OnceCell<Arc<std::sync::Mutex<fastembed::TextEmbedding>>>,
}

#[cfg(feature = "local-embeddings-fastembed")]
impl LocalEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model_name = config
            .model
            .clone()
            .unwrap_or_else(|| "all-minilm-l6-v2".to_string());
        // Fail fast on unknown names instead of at first use.
        config_to_fastembed_model(&model_name)?;
        let dims = config.dims.unwrap_or_else(|| default_local_dims(&model_name));

        Ok(Self {
            model_name,
            dims,
            batch_size: config.batch_size,
            model: tokio::sync::OnceCell::new(),
        })
    }

    async fn model(&self) -> Result<Arc<std::sync::Mutex<fastembed::TextEmbedding>>> {
        let model = self
            .model
            .get_or_try_init(|| async {
                let fastembed_model = config_to_fastembed_model(&self.model_name)?;
                tracing::debug!(model = %self.model_name, "loading local embedding model");
                let loaded = tokio::task::spawn_blocking(move || {
                    fastembed::TextEmbedding::try_new(
                        fastembed::InitOptions::new(fastembed_model)
                            .with_show_download_progress(true),
                    )
                    .map_err(|e| anyhow!("Failed to initialize local embedding model: {}", e))
                })
                .await??;
                Ok::<_, anyhow::Error>(Arc::new(std::sync::Mutex::new(loaded)))
            })
            .await?;
        Ok(Arc::clone(model))
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
#[async_trait]
impl Embedder for LocalEmbedder {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let model = self.model().await?;
        let batch_size = self.batch_size;
        let texts = texts.to_vec();

        tokio::task::spawn_blocking(move || {
            let mut model = model
                .lock()
                .map_err(|_| anyhow!("local embedding model lock poisoned"))?;
            model
                .embed(texts, Some(batch_size))
                .map_err(|e| anyhow!("Local embedding failed: {}", e))
        })
        .await?
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
fn default_local_dims(model_name: &str) -> usize {
    match model_name {
        "bge-base-en-v1.5" | "nomic-embed-text-v1" | "nomic-embed-text-v1.5"
        | "multilingual-e5-base" => 768,
        "bge-large-en-v1.5" | "multilingual-e5-large" => 1024,
        _ => 384,
    }
}

#[cfg(feature = "local-embeddings-fastembed")]
fn config_to_fastembed_model(name: &str) -> Result<fastembed::EmbeddingModel> {
    match name {
        "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
        "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
        "bge-large-en-v1.5" => Ok(fastembed::EmbeddingModel::BGELargeENV15),
        "nomic-embed-text-v1" => Ok(fastembed::EmbeddingModel::NomicEmbedTextV1),
        "nomic-embed-text-v1.5" => Ok(fastembed::EmbeddingModel::NomicEmbedTextV15),
        "multilingual-e5-small" => Ok(fastembed::EmbeddingModel::MultilingualE5Small),
        "multilingual-e5-base" => Ok(fastembed::EmbeddingModel::MultilingualE5Base),
        "multilingual-e5-large" => Ok(fastembed::EmbeddingModel::MultilingualE5Large),
        other => bail!(
            "Unknown local embedding model: '{}'. Supported models: \
             all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5, \
             nomic-embed-text-v1, nomic-embed-text-v1.5, \
             multilingual-e5-small, multilingual-e5-base, multilingual-e5-large",
            other
        ),
    }
}
