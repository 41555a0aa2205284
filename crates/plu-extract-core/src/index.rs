//! In-memory vector index over one document's chunks.
//!
//! Exact brute-force scan: every query is scored against every stored
//! embedding with the index's [`Metric`]. At single-document scale this is
//! cheap, and ranking plus threshold filtering stay exactly verifiable.
//!
//! The index is immutable once built. Re-ingesting a document builds a new
//! index and drops the old one.

use tracing::debug;

use crate::embedding::{check_batch, Embedder, Metric};
use crate::error::{Error, Result};
use crate::models::{Chunk, RetrievalResult, ScoredChunk};

struct IndexEntry {
    chunk: Chunk,
    vector: Vec<f32>,
}

/// `(Chunk, Embedding)` pairs sharing one dimensionality.
pub struct VectorIndex {
    metric: Metric,
    dims: usize,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    /// Embed `chunks` in batches of `batch_size` and index them.
    ///
    /// # Errors
    ///
    /// Propagates embedder failures, and returns
    /// [`Error::EmbeddingUnavailable`] if the provider returns the wrong number
    /// of vectors or vectors of the wrong dimensionality.
    pub async fn build(
        chunks: Vec<Chunk>,
        embedder: &dyn Embedder,
        metric: Metric,
        batch_size: usize,
    ) -> Result<Self> {
        let dims = embedder.dims();
        let batch_size = batch_size.max(1);
        let mut vectors = Vec::with_capacity(chunks.len());

        for batch in chunks.chunks(batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let embedded = embedder.embed(&texts).await?;
            check_batch(texts.len(), dims, &embedded)?;
            vectors.extend(embedded);
            debug!(
                embedded = vectors.len(),
                total = chunks.len(),
                "embedded chunk batch"
            );
        }

        Self::from_embeddings(chunks, vectors, metric, dims)
    }

    /// Index pre-computed embeddings. `chunks` and `vectors` pair up by position.
    pub fn from_embeddings(
        chunks: Vec<Chunk>,
        vectors: Vec<Vec<f32>>,
        metric: Metric,
        dims: usize,
    ) -> Result<Self> {
        if chunks.len() != vectors.len() {
            return Err(Error::EmbeddingUnavailable(format!(
                "{} chunks but {} embeddings",
                chunks.len(),
                vectors.len()
            )));
        }
        check_batch(vectors.len(), dims, &vectors)?;

        let entries = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| IndexEntry { chunk, vector })
            .collect();

        Ok(Self {
            metric,
            dims,
            entries,
        })
    }

    /// Return at most `k` chunks scoring `>= threshold`, best first.
    ///
    /// Equal scores keep document order (the sort is stable over entries
    /// stored in chunk order).
    ///
    /// # Errors
    ///
    /// [`Error::EmbeddingUnavailable`] when the query dimensionality differs
    /// from the index.
    pub fn search(&self, query: &[f32], k: usize, threshold: f32) -> Result<RetrievalResult> {
        if query.len() != self.dims {
            return Err(Error::EmbeddingUnavailable(format!(
                "query embedding has {} dimensions, index has {}",
                query.len(),
                self.dims
            )));
        }
        if k == 0 || self.entries.is_empty() {
            return Ok(RetrievalResult::empty());
        }

        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (i, self.metric.relevance(query, &e.vector)))
            .filter(|(_, score)| *score >= threshold)
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        Ok(RetrievalResult {
            matches: scored
                .into_iter()
                .map(|(i, score)| ScoredChunk {
                    chunk: self.entries[i].chunk.clone(),
                    score,
                })
                .collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    /// Indexed chunks in document order.
    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.entries.iter().map(|e| &e.chunk)
    }
}
