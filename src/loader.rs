//! Document loading: PDF files become one segment per page, plain text and
//! Markdown files a single segment.
//!
//! Text extraction is CPU-bound; async callers run [`load_document`] on the
//! blocking pool.

use plu_extract_core::models::{Document, Segment};
use plu_extract_core::{Error, Result};
use std::path::Path;
use tracing::{debug, warn};

const PDF_MAGIC: &[u8] = b"%PDF-";

/// Load `path` into an ordered list of segments.
///
/// # Errors
///
/// [`Error::DocumentUnreadable`] when the file cannot be read, the PDF cannot
/// be parsed, or a text file is not valid UTF-8.
pub fn load_document(path: &Path) -> Result<Document> {
    let source = path.display().to_string();
    let unreadable = |reason: String| Error::DocumentUnreadable {
        path: source.clone(),
        reason,
    };

    let bytes = std::fs::read(path).map_err(|e| unreadable(e.to_string()))?;

    let segments = if is_pdf(path, &bytes) {
        let pages = catch_panic(|| {
            pdf_extract::extract_text_from_mem_by_pages(&bytes).map_err(|e| e.to_string())
        })
        .map_err(|reason| unreadable(format!("PDF extraction failed: {}", reason)))?;
        pages
            .into_iter()
            .enumerate()
            .map(|(i, text)| Segment {
                text,
                page: Some(i as u32 + 1),
            })
            .collect()
    } else {
        let text = String::from_utf8(bytes)
            .map_err(|_| unreadable("not a PDF and not valid UTF-8 text".to_string()))?;
        vec![Segment { text, page: None }]
    };

    let document = Document::new(source, segments);
    if document.is_blank() {
        warn!(path = %document.source, "document contains no extractable text");
    }
    debug!(
        path = %document.source,
        segments = document.segments.len(),
        "document loaded"
    );
    Ok(document)
}

/// Run a parser that may panic on malformed input, turning the panic into an error.
fn catch_panic<T>(
    f: impl FnOnce() -> std::result::Result<T, String> + std::panic::UnwindSafe,
) -> std::result::Result<T, String> {
    match std::panic::catch_unwind(f) {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            warn!(panic = %message, "PDF parser panicked");
            Err(format!("parser panicked: {}", message))
        }
    }
}

fn is_pdf(path: &Path, bytes: &[u8]) -> bool {
    let by_extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false);
    by_extension || bytes.starts_with(PDF_MAGIC)
}
