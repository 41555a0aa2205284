//! Error taxonomy shared by the core pipeline and the app crate.
//!
//! Every failure surfaces to the immediate caller as a typed [`Error`].
//! Nothing in the pipeline retries automatically.

use std::fmt;

use thiserror::Error;

/// Result alias used throughout the core crate.
pub type Result<T> = std::result::Result<T, Error>;

/// External capability a timeout refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Embedding,
    Generation,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Embedding => f.write_str("embedding"),
            Capability::Generation => f.write_str("generation"),
        }
    }
}

/// Describes why a persistence batch was rolled back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureReport {
    /// Number of records in the batch (none of them were committed).
    pub attempted: usize,
    /// Position of the record that failed, when the failure is record-specific.
    pub failed_index: Option<usize>,
    pub reason: String,
}

impl fmt::Display for FailureReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.failed_index {
            Some(i) => write!(
                f,
                "record {} of {} failed, batch rolled back: {}",
                i + 1,
                self.attempted,
                self.reason
            ),
            None => write!(
                f,
                "batch of {} rolled back: {}",
                self.attempted, self.reason
            ),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// Bad chunking, retrieval or template parameters. Raised before any work starts.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The loader could not read or decode the document.
    #[error("document unreadable: {path}: {reason}")]
    DocumentUnreadable { path: String, reason: String },

    #[error("embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("generation unavailable: {0}")]
    GenerationUnavailable(String),

    /// An external capability call exceeded its deadline.
    #[error("{capability} call timed out after {secs}s")]
    Timeout { capability: Capability, secs: u64 },

    /// `ask` was called before any document was ingested (or after `clear`).
    #[error("Please, add a PDF document first.")]
    NotIngested,

    /// A generated answer is not a bare number.
    #[error("answer is not a bare number: {0:?}")]
    MalformedAnswer(String),

    #[error("invalid fact record: {0}")]
    InvalidRecord(String),

    #[error("persistence failure: {0}")]
    PersistenceFailure(FailureReport),
}

impl Error {
    /// True for failures of the embedding or generation backends, including timeouts.
    pub fn is_capability_failure(&self) -> bool {
        matches!(
            self,
            Error::EmbeddingUnavailable(_) | Error::GenerationUnavailable(_) | Error::Timeout { .. }
        )
    }
}
