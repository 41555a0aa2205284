//! Wiring from configuration to a ready [`ExtractionSession`].

use anyhow::{Context, Result};
use plu_extract_core::{ExtractionSession, IngestReport};
use std::path::Path;

use crate::config::Config;
use crate::embedding::create_embedder;
use crate::generation::create_generator;
use crate::loader::load_document;

/// Build a session with the embedder and generator named in `config`.
pub fn build_session(config: &Config) -> Result<ExtractionSession> {
    let embedder = create_embedder(&config.embedding).context("Failed to create embedder")?;
    let generator =
        create_generator(&config.generation).context("Failed to create generator")?;
    let session = ExtractionSession::new(embedder, generator, config.session_options()?)?;
    Ok(session)
}

/// Load `path` off the async runtime and ingest it into `session`.
pub async fn ingest_path(session: &mut ExtractionSession, path: &Path) -> Result<IngestReport> {
    let owned = path.to_path_buf();
    let document = tokio::task::spawn_blocking(move || load_document(&owned)).await??;

    let report = session
        .ingest(document)
        .await
        .with_context(|| format!("Failed to ingest {}", path.display()))?;
    Ok(report)
}
