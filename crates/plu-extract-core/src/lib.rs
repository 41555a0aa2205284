//! # PLU Extract Core
//!
//! Runtime-free logic for PLU Extract: the data model, segmentation,
//! embedding capability trait, vector index, retrieval, answer synthesis,
//! the extraction session state machine and fact structuring.
//!
//! This crate contains no tokio, sqlx, filesystem I/O or HTTP
//! dependencies. Concrete embedding and generation backends, the document
//! loader and the SQLite fact repository live in the `plu-extract` app
//! crate and are injected through the [`embedding::Embedder`] and
//! [`prompt::Generator`] traits.
//!
//! ## Pipeline
//!
//! ```text
//! ingest:  Document ─▶ chunk::split_document ─▶ Embedder ─▶ VectorIndex
//! ask:     query ─▶ Retriever ─▶ RetrievalResult ─▶ AnswerSynthesizer ─▶ Answer
//! persist: Answer ─▶ facts::FactRecord ─▶ (app) FactRepository
//! ```

pub mod chunk;
pub mod embedding;
pub mod error;
pub mod facts;
pub mod index;
pub mod models;
pub mod prompt;
pub mod retrieve;
pub mod session;

pub use error::{Capability, Error, FailureReport, Result};
pub use session::{ExtractionSession, IngestReport, SessionOptions};
