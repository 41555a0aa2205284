//! Query-time retrieval.
//!
//! The [`Retriever`] embeds a query with the injected [`Embedder`] and asks
//! the [`VectorIndex`] for the best chunks above the relevance threshold.
//! An empty [`RetrievalResult`] means "the document does not mention this";
//! it is a normal outcome, not an error.

use std::sync::Arc;

use tracing::debug;

use crate::embedding::{embed_query, Embedder, Metric};
use crate::error::{Error, Result};
use crate::index::VectorIndex;
use crate::models::RetrievalResult;

/// Retrieval tuning parameters, decoupled from application config.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalParams {
    /// Maximum number of chunks returned.
    pub k: usize,
    /// Minimum normalized relevance (`keep if score >= threshold`).
    ///
    /// The same value is looser under [`Metric::Cosine`] than under
    /// [`Metric::Euclidean`]: on unit vectors 0.6 euclidean relevance needs
    /// cosine 0.84.
    pub score_threshold: f32,
    pub metric: Metric,
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self {
            k: 1,
            score_threshold: 0.6,
            metric: Metric::Cosine,
        }
    }
}

impl RetrievalParams {
    pub fn validate(&self) -> Result<()> {
        if self.k == 0 {
            return Err(Error::InvalidConfig("retrieval k must be >= 1".to_string()));
        }
        if !(0.0..=1.0).contains(&self.score_threshold) {
            return Err(Error::InvalidConfig(format!(
                "score_threshold must be in [0.0, 1.0], got {}",
                self.score_threshold
            )));
        }
        Ok(())
    }
}

pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    params: RetrievalParams,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, params: RetrievalParams) -> Result<Self> {
        params.validate()?;
        Ok(Self { embedder, params })
    }

    pub fn params(&self) -> &RetrievalParams {
        &self.params
    }

    /// Embed `query` and search `index`.
    pub async fn retrieve(&self, query: &str, index: &VectorIndex) -> Result<RetrievalResult> {
        let query_vec = embed_query(self.embedder.as_ref(), query).await?;
        let result = index.search(&query_vec, self.params.k, self.params.score_threshold)?;
        debug!(
            matches = result.len(),
            best = result.best().map(|m| m.score),
            threshold = self.params.score_threshold,
            "retrieved context"
        );
        Ok(result)
    }
}
