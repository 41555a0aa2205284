//! Embedding capability trait and vector utilities.
//!
//! Defines the [`Embedder`] trait that all embedding backends implement,
//! the [`Metric`] used to score chunks against a query, and
//! [`HashingEmbedder`], an offline feature-hashing embedder.
//!
//! Network and model-backed providers (Ollama, OpenAI, fastembed) live in
//! the `plu-extract` app crate.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{Error, Result};

/// Trait for embedding providers.
///
/// Implementations are created by the application and injected into the
/// [`ExtractionSession`](crate::session::ExtractionSession).
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"bge-small-en-v1.5"`).
    fn model_name(&self) -> &str;
    /// Returns the embedding vector dimensionality (e.g. `384`).
    fn dims(&self) -> usize;
    /// Embed a batch of texts, returning one vector per input in the same order.
    ///
    /// Failures surface as [`Error::EmbeddingUnavailable`] or
    /// [`Error::Timeout`].
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Embed a single query text.
pub async fn embed_query(embedder: &dyn Embedder, text: &str) -> Result<Vec<f32>> {
    let vectors = embedder.embed(&[text.to_string()]).await?;
    check_batch(1, embedder.dims(), &vectors)?;
    Ok(vectors.into_iter().next().unwrap_or_default())
}

/// Verify a provider response: one vector per input, all of `dims` length.
pub fn check_batch(expected: usize, dims: usize, vectors: &[Vec<f32>]) -> Result<()> {
    if vectors.len() != expected {
        return Err(Error::EmbeddingUnavailable(format!(
            "expected {} embeddings, got {}",
            expected,
            vectors.len()
        )));
    }
    if let Some(v) = vectors.iter().find(|v| v.len() != dims) {
        return Err(Error::EmbeddingUnavailable(format!(
            "embedding has {} dimensions, expected {}",
            v.len(),
            dims
        )));
    }
    Ok(())
}

/// Similarity metric used by the vector index.
///
/// Both metrics are higher-is-better and normalized to `[0, 1]`, so a single
/// `score >= threshold` rule applies regardless of the metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// `max(cos(a, b), 0)`.
    #[default]
    Cosine,
    /// `max(1 - ‖â - b̂‖ / √2, 0)` over unit-normalized vectors.
    Euclidean,
}

impl Metric {
    /// Relevance of `b` to `a` in `[0, 1]`. Zero vectors score 0.
    pub fn relevance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Metric::Cosine => cosine_similarity(a, b).max(0.0),
            Metric::Euclidean => {
                let (na, nb) = (norm(a), norm(b));
                if a.len() != b.len() || na < f32::EPSILON || nb < f32::EPSILON {
                    return 0.0;
                }
                let dist = a
                    .iter()
                    .zip(b.iter())
                    .map(|(x, y)| {
                        let d = x / na - y / nb;
                        d * d
                    })
                    .sum::<f32>()
                    .sqrt();
                (1.0 - dist / std::f32::consts::SQRT_2).max(0.0)
            }
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Cosine => f.write_str("cosine"),
            Metric::Euclidean => f.write_str("euclidean"),
        }
    }
}

impl FromStr for Metric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "cosine" => Ok(Metric::Cosine),
            "euclidean" | "l2" => Ok(Metric::Euclidean),
            other => Err(Error::InvalidConfig(format!(
                "unknown similarity metric: '{}'. Use cosine or euclidean.",
                other
            ))),
        }
    }
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`, or `0.0` for empty vectors, zero
/// vectors, or vectors of different lengths.
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

fn norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Scale `v` to unit length in place. Zero vectors are left unchanged.
pub fn l2_normalize(v: &mut [f32]) {
    let n = norm(v);
    if n >= f32::EPSILON {
        for x in v.iter_mut() {
            *x /= n;
        }
    }
}

/// Offline embedder: accent-folded, lowercased word tokens hashed into
/// `dims` buckets (FNV-1a), then L2-normalized.
///
/// Scores reflect lexical overlap only. Useful without a model download and
/// as a deterministic backend in tests.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dims: usize,
}

impl HashingEmbedder {
    pub fn new(dims: usize) -> Result<Self> {
        if dims == 0 {
            return Err(Error::InvalidConfig(
                "hashing embedder needs dims > 0".to_string(),
            ));
        }
        Ok(Self { dims })
    }

    /// Embed one text synchronously.
    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dims];
        for token in tokenize(text) {
            let bucket = (fnv1a(token.as_bytes()) % self.dims as u64) as usize;
            v[bucket] += 1.0;
        }
        l2_normalize(&mut v);
        v
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    fn model_name(&self) -> &str {
        "hashing"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.chars().flat_map(char::to_lowercase).map(fold_accent).collect())
        .collect()
}

fn fold_accent(c: char) -> char {
    match c {
        'à' | 'â' | 'ä' | 'á' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'î' | 'ï' | 'í' => 'i',
        'ô' | 'ö' | 'ó' => 'o',
        'ù' | 'û' | 'ü' | 'ú' => 'u',
        'ç' => 'c',
        'ÿ' => 'y',
        other => other,
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for b in bytes {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}
