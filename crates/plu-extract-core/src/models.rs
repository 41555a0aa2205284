//! Core data models flowing through the extraction pipeline.
//!
//! A [`Document`] is split into [`Chunk`]s, chunks are scored against a
//! query into a [`RetrievalResult`], and the synthesizer turns that context
//! into an [`Answer`].

/// One ordered unit of loaded text (a PDF page, or a whole text file).
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub text: String,
    /// 1-based page number when the loader knows it.
    pub page: Option<u32>,
}

/// A loaded document: its source identifier and ordered text segments.
#[derive(Debug, Clone)]
pub struct Document {
    /// Source identifier, typically the file path.
    pub source: String,
    pub segments: Vec<Segment>,
}

impl Document {
    pub fn new(source: impl Into<String>, segments: Vec<Segment>) -> Self {
        Self {
            source: source.into(),
            segments,
        }
    }

    /// Build a single-segment document from plain text.
    pub fn from_text(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(
            source,
            vec![Segment {
                text: text.into(),
                page: None,
            }],
        )
    }

    /// True when no segment carries any non-whitespace text.
    pub fn is_blank(&self) -> bool {
        self.segments.iter().all(|s| s.text.trim().is_empty())
    }
}

/// A contiguous slice of one segment of a document.
///
/// `start`/`end` are character offsets into the segment's text, so
/// `segment.text.chars().skip(start).take(end - start)` equals `text`.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Deterministic UUID (v5) derived from the document source and chunk index.
    pub id: String,
    /// Source identifier of the parent document (provenance only).
    pub document_id: String,
    /// Contiguous index across the whole document, starting at 0.
    pub chunk_index: usize,
    /// Index of the segment this chunk was cut from.
    pub segment: usize,
    pub page: Option<u32>,
    pub start: usize,
    pub end: usize,
    pub text: String,
    /// SHA-256 of `text`, hex encoded.
    pub hash: String,
}

impl Chunk {
    /// Length in characters.
    pub fn char_len(&self) -> usize {
        self.end - self.start
    }
}

/// A chunk paired with its relevance score in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Retrieved context, highest score first. Empty when nothing cleared the threshold.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievalResult {
    pub matches: Vec<ScoredChunk>,
}

impl RetrievalResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn best(&self) -> Option<&ScoredChunk> {
        self.matches.first()
    }
}

/// Raw generated text together with the context it was grounded on.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub question: String,
    /// Generator output, unmodified.
    pub text: String,
    pub context: RetrievalResult,
}

impl Answer {
    /// False on the empty-context path: no chunk cleared the relevance threshold.
    pub fn has_context(&self) -> bool {
        !self.context.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_document() {
        assert!(Document::from_text("a.txt", "  \n\n ").is_blank());
        assert!(!Document::from_text("a.txt", "Zone U1").is_blank());
        assert!(Document::new("empty.pdf", Vec::new()).is_blank());
    }

    #[test]
    fn answer_without_context() {
        let answer = Answer {
            question: "q".to_string(),
            text: "".to_string(),
            context: RetrievalResult::empty(),
        };
        assert!(!answer.has_context());
        assert!(answer.context.best().is_none());
    }
}
