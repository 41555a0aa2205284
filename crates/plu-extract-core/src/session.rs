//! The extraction session: ingest → ask → clear.
//!
//! ```text
//!            ingest(doc)              ask(q) → Answer
//!   Empty ───────────────▶ Ready ◀──────────────┐
//!     ▲                     │  └────────────────┘
//!     └──────── clear() ────┘  ingest(doc) rebuilds the index
//! ```
//!
//! Capabilities are injected at construction, so the same session runs
//! against Ollama, OpenAI, fastembed or test doubles. `ingest`, `ask` and
//! `clear` take `&mut self`: one caller at a time drives a session and its
//! index.

use std::sync::Arc;

use tracing::{debug, info};

use crate::chunk::{split_document, ChunkingParams};
use crate::embedding::Embedder;
use crate::error::{Error, Result};
use crate::index::VectorIndex;
use crate::models::{Answer, Document};
use crate::prompt::{AnswerSynthesizer, Generator, PromptTemplate};
use crate::retrieve::{RetrievalParams, Retriever};

/// Everything a session needs besides its capabilities.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub chunking: ChunkingParams,
    pub retrieval: RetrievalParams,
    /// Number of chunk texts per embedding call.
    pub embed_batch_size: usize,
    pub template: PromptTemplate,
    /// Fixed sampling seed forwarded to the generator, if any.
    pub seed: Option<u64>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            chunking: ChunkingParams::default(),
            retrieval: RetrievalParams::default(),
            embed_batch_size: 64,
            template: PromptTemplate::default(),
            seed: None,
        }
    }
}

/// Summary of a successful ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestReport {
    pub source: String,
    pub segments: usize,
    pub chunks: usize,
    pub dims: usize,
    pub model: String,
}

struct Loaded {
    source: String,
    index: VectorIndex,
}

enum SessionState {
    Empty,
    Ready(Loaded),
}

pub struct ExtractionSession {
    embedder: Arc<dyn Embedder>,
    retriever: Retriever,
    synthesizer: AnswerSynthesizer,
    options: SessionOptions,
    state: SessionState,
}

impl ExtractionSession {
    /// # Errors
    ///
    /// [`Error::InvalidConfig`] for invalid chunking or retrieval parameters.
    pub fn new(
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        options: SessionOptions,
    ) -> Result<Self> {
        options.chunking.validate()?;
        let retriever = Retriever::new(embedder.clone(), options.retrieval)?;
        let synthesizer = AnswerSynthesizer::new(generator, options.template.clone(), options.seed);
        Ok(Self {
            embedder,
            retriever,
            synthesizer,
            options,
            state: SessionState::Empty,
        })
    }

    /// Segment, embed and index `document`, replacing any previous index.
    ///
    /// On failure the session keeps whatever state it had before the call.
    pub async fn ingest(&mut self, document: Document) -> Result<IngestReport> {
        let chunks = split_document(&document, &self.options.chunking)?;
        let chunk_count = chunks.len();
        debug!(
            source = %document.source,
            chunks = chunk_count,
            chunk_size = self.options.chunking.chunk_size,
            chunk_overlap = self.options.chunking.chunk_overlap,
            "split document"
        );

        let index = VectorIndex::build(
            chunks,
            self.embedder.as_ref(),
            self.options.retrieval.metric,
            self.options.embed_batch_size,
        )
        .await?;

        let report = IngestReport {
            source: document.source.clone(),
            segments: document.segments.len(),
            chunks: chunk_count,
            dims: index.dims(),
            model: self.embedder.model_name().to_string(),
        };

        if let SessionState::Ready(previous) = &self.state {
            info!(previous = %previous.source, "replacing index");
        }
        self.state = SessionState::Ready(Loaded {
            source: document.source,
            index,
        });
        info!(
            source = %report.source,
            chunks = report.chunks,
            dims = report.dims,
            "document ingested"
        );
        Ok(report)
    }

    /// Retrieve context for `query` and synthesize an answer.
    ///
    /// # Errors
    ///
    /// [`Error::NotIngested`] before the first `ingest` or after `clear`;
    /// capability failures otherwise.
    pub async fn ask(&mut self, query: &str) -> Result<Answer> {
        let loaded = match &self.state {
            SessionState::Ready(loaded) => loaded,
            SessionState::Empty => return Err(Error::NotIngested),
        };

        let context = self.retriever.retrieve(query, &loaded.index).await?;
        let text = self.synthesizer.synthesize(query, &context.matches).await?;

        Ok(Answer {
            question: query.to_string(),
            text,
            context,
        })
    }

    /// Drop the index, its chunks and the document identity.
    pub fn clear(&mut self) {
        if let SessionState::Ready(loaded) = &self.state {
            debug!(source = %loaded.source, "clearing session");
        }
        self.state = SessionState::Empty;
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, SessionState::Ready(_))
    }

    /// Source of the currently ingested document.
    pub fn source(&self) -> Option<&str> {
        match &self.state {
            SessionState::Ready(loaded) => Some(&loaded.source),
            SessionState::Empty => None,
        }
    }

    pub fn index(&self) -> Option<&VectorIndex> {
        match &self.state {
            SessionState::Ready(loaded) => Some(&loaded.index),
            SessionState::Empty => None,
        }
    }
}
