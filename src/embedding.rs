//! Embedding providers.
//!
//! Concrete implementations of the core [`Embedder`] trait:
//! - **[`LocalEmbedder`]**: fastembed models run in-process (feature
//!   `local-embeddings`); no network calls after the first model download.
//! - **[`OllamaEmbedder`]**: `POST {url}/api/embed` on a local Ollama.
//! - **[`OpenAIEmbedder`]**: `POST /v1/embeddings`, key from `OPENAI_API_KEY`.
//! - [`HashingEmbedder`]: offline lexical embedder from the core crate.
//!
//! Use [`create_embedder`] to build the provider named in `[embedding]`.
//! Every call is bounded by `embedding.timeout_secs` and never retried.

use async_trait::async_trait;
use plu_extract_core::embedding::{Embedder, HashingEmbedder};
use plu_extract_core::{Capability, Error, Result};
use serde_json::json;
use std::sync::Arc;

use crate::config::EmbeddingConfig;
use crate::http;

/// Bucket count for the hashing embedder when `dims` is not configured.
const DEFAULT_HASHING_DIMS: usize = 1024;

/// Build the embedder named by `config.provider`.
///
/// # Errors
///
/// Unknown provider names, missing model or dims for HTTP providers, a
/// missing `OPENAI_API_KEY`, or `local` without the `local-embeddings` feature.
pub fn create_embedder(config: &EmbeddingConfig) -> anyhow::Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "ollama" => Ok(Arc::new(OllamaEmbedder::new(config)?)),
        "openai" => Ok(Arc::new(OpenAIEmbedder::new(config)?)),
        "hashing" => Ok(Arc::new(HashingEmbedder::new(
            config.dims.unwrap_or(DEFAULT_HASHING_DIMS),
        )?)),
        #[cfg(feature = "local-embeddings")]
        "local" => Ok(Arc::new(LocalEmbedder::new(config)?)),
        #[cfg(not(feature = "local-embeddings"))]
        "local" => anyhow::bail!(
            "Local embedding provider requires --features local-embeddings"
        ),
        other => anyhow::bail!("Unknown embedding provider: {}", other),
    }
}

fn required_model(config: &EmbeddingConfig) -> anyhow::Result<String> {
    config.model.clone().ok_or_else(|| {
        anyhow::anyhow!("embedding.model required for {} provider", config.provider)
    })
}

fn required_dims(config: &EmbeddingConfig) -> anyhow::Result<usize> {
    config
        .dims
        .filter(|d| *d > 0)
        .ok_or_else(|| anyhow::anyhow!("embedding.dims required for {} provider", config.provider))
}

/// Read a JSON array of numbers as an `f32` vector.
fn parse_vector(value: &serde_json::Value, provider: &str) -> Result<Vec<f32>> {
    let items = value.as_array().ok_or_else(|| {
        Error::EmbeddingUnavailable(format!("invalid {} response: embedding is not an array", provider))
    })?;
    items
        .iter()
        .map(|v| {
            v.as_f64().map(|f| f as f32).ok_or_else(|| {
                Error::EmbeddingUnavailable(format!(
                    "invalid {} response: non-numeric embedding value",
                    provider
                ))
            })
        })
        .collect()
}

// ============ Ollama ============

pub struct OllamaEmbedder {
    client: reqwest::Client,
    url: String,
    model: String,
    dims: usize,
    timeout_secs: u64,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> anyhow::Result<Self> {
        Ok(Self {
            client: http::client(config.timeout_secs)?,
            url: config
                .url
                .clone()
                .unwrap_or_else(|| http::DEFAULT_OLLAMA_URL.to_string()),
            model: required_model(config)?,
            dims: required_dims(config)?,
            timeout_secs: config.timeout_secs,
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
        let body = json!({
            "model": self.model,
            "input": texts,
        });
        let json = http::post_json(
            &self.client,
            &format!("{}/api/embed", self.url.trim_end_matches('/')),
            None,
            &body,
            Capability::Embedding,
            self.timeout_secs,
        )
        .await?;
        parse_ollama_response(&json)
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    json.get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| {
            Error::EmbeddingUnavailable(
                "invalid Ollama response: missing embeddings array".to_string(),
            )
        })?
        .iter()
        .map(|e| parse_vector(e, "Ollama"))
        .collect()
}

// ============ OpenAI ============

pub struct OpenAIEmbedder {
    client: reqwest::Client,
    url: String,
    api_key: String,
    model: String,
    dims: usize,
    timeout_secs: u64,
}

impl OpenAIEmbedder {
    pub fn new(config: &EmbeddingConfig) -> anyhow::Result<Self> {
        Ok(Self {
            client: http::client(config.timeout_secs)?,
            url: config
                .url
                .clone()
                .unwrap_or_else(|| http::DEFAULT_OPENAI_URL.to_string()),
            api_key: http::openai_api_key()?,
            model: required_model(config)?,
            dims: required_dims(config)?,
            timeout_secs: config.timeout_secs,
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
        let body = json!({
            "model": self.model,
            "input": texts,
        });
        let json = http::post_json(
            &self.client,
            &format!("{}/v1/embeddings", self.url.trim_end_matches('/')),
            Some(&self.api_key),
            &body,
            Capability::Embedding,
            self.timeout_secs,
        )
        .await?;
        parse_openai_response(&json)
    }
}

/// Extract `data[].embedding`, ordered by `data[].index`.
fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json.get("data").and_then(|d| d.as_array()).ok_or_else(|| {
        Error::EmbeddingUnavailable("invalid OpenAI response: missing data array".to_string())
    })?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let embedding = item.get("embedding").ok_or_else(|| {
            Error::EmbeddingUnavailable("invalid OpenAI response: missing embedding".to_string())
        })?;
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(position);
        indexed.push((index, parse_vector(embedding, "OpenAI")?));
    }
    indexed.sort_by_key(|(index, _)| *index);

    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

// ============ Local (fastembed) ============

/// In-process embedder backed by fastembed.
///
/// The model is downloaded from Hugging Face on first use and kept loaded
/// for the lifetime of the provider. Inference runs on the blocking pool.
#[cfg(feature = "local-embeddings")]
pub struct LocalEmbedder {
    model_name: String,
    model: fastembed::EmbeddingModel,
    dims: usize,
    batch_size: usize,
    timeout_secs: u64,
    loaded: Arc<std::sync::Mutex<Option<fastembed::TextEmbedding>>>,
}

#[cfg(feature = "local-embeddings")]
impl LocalEmbedder {
    pub fn new(config: &EmbeddingConfig) -> anyhow::Result<Self> {
        let model_name = config
            .model
            .clone()
            .unwrap_or_else(|| local::DEFAULT_MODEL.to_string());
        let model = local::fastembed_model(&model_name)?;
        let dims = config.dims.unwrap_or_else(|| local::default_dims(&model_name));
        Ok(Self {
            model_name,
            model,
            dims,
            batch_size: config.batch_size,
            timeout_secs: config.timeout_secs,
            loaded: Arc::new(std::sync::Mutex::new(None)),
        })
    }

    /// Load the model if needed. Not bounded by the call timeout, since the
    /// first load may include a download.
    async fn ensure_loaded(&self) -> Result<()> {
        let loaded = self.loaded.clone();
        let model = self.model.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = loaded
                .lock()
                .map_err(|_| Error::EmbeddingUnavailable("local model lock poisoned".to_string()))?;
            if guard.is_none() {
                tracing::info!(model = ?model, "loading local embedding model");
                let embedding = fastembed::TextEmbedding::try_new(
                    fastembed::InitOptions::new(model).with_show_download_progress(true),
                )
                .map_err(|e| {
                    Error::EmbeddingUnavailable(format!(
                        "failed to initialize local embedding model: {}",
                        e
                    ))
                })?;
                *guard = Some(embedding);
            }
            Ok(())
        })
        .await
        .map_err(|e| Error::EmbeddingUnavailable(format!("embedding task failed: {}", e)))?
    }
}

#[cfg(feature = "local-embeddings")]
#[async_trait]
impl Embedder for LocalEmbedder {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.ensure_loaded().await?;

        let loaded = self.loaded.clone();
        let texts = texts.to_vec();
        let batch_size = self.batch_size;
        let task = tokio::task::spawn_blocking(move || {
            let mut guard = loaded
                .lock()
                .map_err(|_| Error::EmbeddingUnavailable("local model lock poisoned".to_string()))?;
            let model = guard.as_mut().ok_or_else(|| {
                Error::EmbeddingUnavailable("local model not loaded".to_string())
            })?;
            model
                .embed(texts, Some(batch_size))
                .map_err(|e| Error::EmbeddingUnavailable(format!("local embedding failed: {}", e)))
        });

        match tokio::time::timeout(std::time::Duration::from_secs(self.timeout_secs), task).await {
            Err(_) => Err(Error::Timeout {
                capability: Capability::Embedding,
                secs: self.timeout_secs,
            }),
            Ok(Err(join)) => Err(Error::EmbeddingUnavailable(format!(
                "embedding task failed: {}",
                join
            ))),
            Ok(Ok(result)) => result,
        }
    }
}

#[cfg(feature = "local-embeddings")]
mod local {
    pub const DEFAULT_MODEL: &str = "bge-small-en-v1.5";

    pub fn default_dims(name: &str) -> usize {
        match name {
            "bge-base-en-v1.5" | "multilingual-e5-base" | "nomic-embed-text-v1.5" => 768,
            "bge-large-en-v1.5" | "multilingual-e5-large" => 1024,
            _ => 384,
        }
    }

    pub fn fastembed_model(name: &str) -> anyhow::Result<fastembed::EmbeddingModel> {
        match name {
            "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
            "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
            "bge-base-en-v1.5" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
            "bge-large-en-v1.5" => Ok(fastembed::EmbeddingModel::BGELargeENV15),
            "nomic-embed-text-v1.5" => Ok(fastembed::EmbeddingModel::NomicEmbedTextV15),
            "multilingual-e5-small" => Ok(fastembed::EmbeddingModel::MultilingualE5Small),
            "multilingual-e5-base" => Ok(fastembed::EmbeddingModel::MultilingualE5Base),
            "multilingual-e5-large" => Ok(fastembed::EmbeddingModel::MultilingualE5Large),
            other => anyhow::bail!(
                "Unknown local embedding model: '{}'. Supported models: \
                 all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5, \
                 nomic-embed-text-v1.5, multilingual-e5-small, multilingual-e5-base, \
                 multilingual-e5-large",
                other
            ),
        }
    }
}
