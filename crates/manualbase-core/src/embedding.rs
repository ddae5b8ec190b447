//! Embedding capability trait and vector utilities.
//!
//! Defines the [`Embedder`] trait that every embedding backend implements,
//! a deterministic offline [`HashingEmbedder`], and pure helpers for vector
//! serialization and similarity computation.
//!
//! Network and model-backed providers (OpenAI, Ollama, fastembed) live in the
//! `manualbase` app crate.

use anyhow::Result;
use async_trait::async_trait;
use sha2::{Digest, Sha256};

/// Trait for embedding providers.
///
/// Implementations may load expensive resources lazily on the first call to
/// [`embed`](Embedder::embed); a failed load must not be cached, so the next
/// call retries.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"all-minilm-l6-v2"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality (e.g. `384`).
    fn dims(&self) -> usize;
    /// Embed a batch of texts, returning one vector per input in order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Feature-hashing embedder: every lowercase alphanumeric token is hashed
/// into one of `dims` buckets with a ±1 sign, and the vector is
/// L2-normalized.
///
/// Needs no model download, so it serves offline setups and tests. Texts
/// sharing vocabulary land close together under cosine distance.
pub struct HashingEmbedder {
    dims: usize,
}

impl HashingEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }

    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vec = vec![0.0f32; self.dims];
        let lower = text.to_lowercase();
        for token in lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let digest = Sha256::digest(token.as_bytes());
            let bucket = u64::from_le_bytes([
                digest[0], digest[1], digest[2], digest[3], digest[4], digest[5], digest[6],
                digest[7],
            ]) % self.dims as u64;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vec[bucket as usize] += sign;
        }
        normalize(&mut vec);
        vec
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn model_name(&self) -> &str {
        "hash"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

fn normalize(vec: &mut [f32]) {
    let norm = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for x in vec.iter_mut() {
            *x /= norm;
        }
    }
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// # Example
///
/// ```rust
/// use manualbase_core::embedding::{vec_to_blob, blob_to_vec};
///
/// let v = vec![1.0f32, -2.5, 3.125];
/// let blob = vec_to_blob(&v);
/// assert_eq!(blob.len(), 12); // 3 × 4 bytes
/// assert_eq!(blob_to_vec(&blob), v);
/// ```
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`, or `0.0` for empty vectors or
/// vectors of different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

/// Cosine distance `1 − cos(a, b)`, in `[0.0, 2.0]`. Smaller is closer.
pub fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    1.0 - cosine_similarity(a, b)
}
