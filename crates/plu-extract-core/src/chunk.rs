//! Boundary-aware text segmenter.
//!
//! Splits each [`Segment`] of a [`Document`] into [`Chunk`]s of at most
//! `chunk_size` characters, with consecutive chunks overlapping by at most
//! `chunk_overlap` characters.
//!
//! # Algorithm
//!
//! For each window `[start, start + chunk_size)` the chunk end is the last
//! position inside the window that follows, in order of preference:
//!
//! 1. a paragraph break (`\n\n`),
//! 2. a line break,
//! 3. a sentence end (`.`, `!`, `?`, `;`, `:` followed by whitespace),
//! 4. any whitespace not directly preceded by a digit,
//! 5. otherwise a hard cut at the window edge, backed off so that a run of
//!    digits is not split in two.
//!
//! Since the extracted facts are numbers, cutting on whitespace keeps a value
//! and its unit (`9 mètres`) together whenever the window contains any space.
//!
//! Chunks are exact slices of the segment text. The next chunk starts at
//! most `chunk_overlap` characters before the previous end, snapped forward
//! to the start of a word.
//!
//! # Example
//!
//! ```rust
//! use plu_extract_core::chunk::{split_document, ChunkingParams};
//! use plu_extract_core::models::Document;
//!
//! let doc = Document::from_text("plu.txt", "Zone U1.\n\nHauteur : 9 mètres.");
//! let chunks = split_document(&doc, &ChunkingParams::default()).unwrap();
//! assert_eq!(chunks.len(), 1);
//! assert_eq!(chunks[0].chunk_index, 0);
//! ```

use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{Chunk, Document};

/// Chunk size and overlap, both counted in characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkingParams {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingParams {
    fn default() -> Self {
        Self {
            chunk_size: 4096,
            chunk_overlap: 0,
        }
    }
}

impl ChunkingParams {
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::InvalidConfig("chunk_size must be > 0".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(Error::InvalidConfig(format!(
                "chunk_overlap ({}) must be < chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum Boundary {
    Paragraph,
    Line,
    Sentence,
    Word,
}

const BOUNDARIES: [Boundary; 4] = [
    Boundary::Paragraph,
    Boundary::Line,
    Boundary::Sentence,
    Boundary::Word,
];

/// Split a document into chunks.
///
/// Chunk indices are contiguous across segments, starting at 0.
/// Whitespace-only slices are dropped, so a blank document yields no chunks.
/// With zero overlap the chunks of a segment concatenate back to the segment
/// text minus those dropped slices (typically trailing whitespace that does
/// not fit in the last chunk).
///
/// # Errors
///
/// [`Error::InvalidConfig`] when `chunk_size == 0` or
/// `chunk_overlap >= chunk_size`.
pub fn split_document(document: &Document, params: &ChunkingParams) -> Result<Vec<Chunk>> {
    params.validate()?;

    let mut chunks = Vec::new();
    for (seg_idx, segment) in document.segments.iter().enumerate() {
        let chars: Vec<char> = segment.text.chars().collect();
        let mut byte_at: Vec<usize> = segment.text.char_indices().map(|(i, _)| i).collect();
        byte_at.push(segment.text.len());

        for (start, end) in split_spans(&chars, params.chunk_size, params.chunk_overlap) {
            let text = &segment.text[byte_at[start]..byte_at[end]];
            if text.trim().is_empty() {
                continue;
            }
            let index = chunks.len();
            chunks.push(make_chunk(
                &document.source,
                index,
                seg_idx,
                segment.page,
                start,
                end,
                text,
            ));
        }
    }

    Ok(chunks)
}

/// Compute `(start, end)` character spans covering `chars`.
///
/// Every span is at most `size` long, spans leave no gaps, each span ends
/// strictly after the previous one and starts at most `overlap` characters
/// before the previous end.
fn split_spans(chars: &[char], size: usize, overlap: usize) -> Vec<(usize, usize)> {
    let n = chars.len();
    let mut spans = Vec::new();
    let mut start = 0;
    let mut prev_end = 0;

    while start < n {
        let limit = (start + size).min(n);
        // A chunk must reach past the previous end and hold some non-whitespace.
        let floor = start.max(prev_end);
        let content = (floor..limit)
            .find(|&i| !chars[i].is_whitespace())
            .unwrap_or(limit);
        let end = if limit == n {
            n
        } else {
            find_break(chars, content, limit)
        };
        spans.push((start, end));
        if end == n {
            break;
        }
        start = next_start(chars, start, end, overlap);
        prev_end = end;
    }

    spans
}

/// Best chunk end in `(floor, limit]`.
fn find_break(chars: &[char], floor: usize, limit: usize) -> usize {
    for boundary in BOUNDARIES {
        if let Some(p) = ((floor + 1)..=limit)
            .rev()
            .find(|&p| is_boundary(chars, p, boundary))
        {
            return p;
        }
    }
    hard_cut(chars, floor, limit)
}

/// True when a chunk may end right before `chars[p]`.
fn is_boundary(chars: &[char], p: usize, boundary: Boundary) -> bool {
    let last = chars[p - 1];
    match boundary {
        Boundary::Paragraph => {
            p >= 2 && last == '\n' && chars[p - 2] == '\n' && !follows_number(chars, p)
        }
        Boundary::Line => last == '\n' && !follows_number(chars, p),
        Boundary::Sentence => {
            p >= 2 && last.is_whitespace() && matches!(chars[p - 2], '.' | '!' | '?' | ';' | ':')
        }
        Boundary::Word => last.is_whitespace() && !follows_number(chars, p),
    }
}

/// True when the whitespace run ending at `p` comes right after a digit.
///
/// A number and its unit ("9 mètres", "9\nmètres", "60 %") stay together.
fn follows_number(chars: &[char], p: usize) -> bool {
    chars[..p]
        .iter()
        .rev()
        .find(|c| !c.is_whitespace())
        .is_some_and(|c| c.is_ascii_digit())
}

fn hard_cut(chars: &[char], floor: usize, limit: usize) -> usize {
    let splits_number =
        |p: usize| p < chars.len() && chars[p - 1].is_ascii_digit() && chars[p].is_ascii_digit();

    let mut p = limit;
    while p > floor + 1 && splits_number(p) {
        p -= 1;
    }
    if splits_number(p) {
        // The whole window is one digit run; nothing better than the edge.
        limit
    } else {
        p
    }
}

fn next_start(chars: &[char], start: usize, end: usize, overlap: usize) -> usize {
    if overlap == 0 {
        return end;
    }
    let earliest = end.saturating_sub(overlap).max(start + 1);
    (earliest..end)
        .find(|&q| chars[q - 1].is_whitespace())
        .unwrap_or(end)
}

fn make_chunk(
    document_id: &str,
    index: usize,
    segment: usize,
    page: Option<u32>,
    start: usize,
    end: usize,
    text: &str,
) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    let id = Uuid::new_v5(
        &Uuid::NAMESPACE_URL,
        format!("{}#{}", document_id, index).as_bytes(),
    );

    Chunk {
        id: id.to_string(),
        document_id: document_id.to_string(),
        chunk_index: index,
        segment,
        page,
        start,
        end,
        text: text.to_string(),
        hash,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Segment;

    fn params(chunk_size: usize, chunk_overlap: usize) -> ChunkingParams {
        ChunkingParams {
            chunk_size,
            chunk_overlap,
        }
    }

    fn reglement() -> String {
        [
            "Article U1.10 - Hauteur maximale des constructions.",
            "La hauteur maximale des constructions est fixée à 9 mètres à l'égout du toit.",
            "Article U1.9 - Emprise au sol. L'emprise au sol des constructions ne peut excéder 60 % de la superficie du terrain.",
            "Zone N. Les constructions nouvelles sont interdites, sauf les abris de jardin de 12,5 m² maximum.",
        ]
        .join("\n\n")
    }

    /// Stitch chunks back together by dropping each chunk's overlapping prefix.
    fn reconstruct(chunks: &[Chunk]) -> String {
        let mut out = String::new();
        let mut prev_end: usize = 0;
        for c in chunks {
            let skip = prev_end.saturating_sub(c.start);
            out.extend(c.text.chars().skip(skip));
            prev_end = c.end;
        }
        out
    }

    #[test]
    fn test_small_text_single_chunk() {
        let doc = Document::from_text("doc1", "Hello, world!");
        let chunks = split_document(&doc, &params(700, 0)).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].text, "Hello, world!");
        assert_eq!((chunks[0].start, chunks[0].end), (0, 13));
    }

    #[test]
    fn test_empty_text_yields_no_chunks() {
        let doc = Document::from_text("doc1", "");
        assert!(split_document(&doc, &params(700, 0)).unwrap().is_empty());
        let doc = Document::from_text("doc1", "   \n\n  ");
        assert!(split_document(&doc, &params(700, 0)).unwrap().is_empty());
    }

    #[test]
    fn test_invalid_params() {
        let doc = Document::from_text("doc1", "text");
        assert!(matches!(
            split_document(&doc, &params(0, 0)),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            split_document(&doc, &params(100, 100)),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(
            split_document(&doc, &params(100, 150)),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_prefers_paragraph_boundaries() {
        let text = reglement();
        let chunks = split_document(&Document::from_text("plu", text.as_str()), &params(135, 0))
            .unwrap();
        assert!(chunks.len() > 1);
        // The first two paragraphs plus their separators take 132 chars.
        assert!(chunks[0].text.ends_with("\n\n"));
        assert!(chunks[0].text.contains("9 mètres"));
    }

    #[test]
    fn test_lengths_bounded_and_reconstructs_without_overlap() {
        let text = reglement();
        let doc = Document::from_text("plu", text.as_str());
        for size in [10, 25, 40, 64, 100, 4096] {
            let chunks = split_document(&doc, &params(size, 0)).unwrap();
            for c in &chunks {
                assert!(c.char_len() <= size, "chunk of {} > {}", c.char_len(), size);
                assert_eq!(c.text.chars().count(), c.char_len());
            }
            let joined: String = chunks.iter().map(|c| c.text.as_str()).collect();
            assert_eq!(joined, text, "size {}", size);
        }
    }

    #[test]
    fn test_overlap_bounded_and_reconstructs() {
        let text = reglement();
        let doc = Document::from_text("plu", text.as_str());
        for (size, overlap) in [(40, 10), (64, 20), (100, 99), (30, 1)] {
            let chunks = split_document(&doc, &params(size, overlap)).unwrap();
            for pair in chunks.windows(2) {
                let (a, b) = (&pair[0], &pair[1]);
                assert!(b.start <= a.end, "gap between chunks");
                assert!(a.end - b.start <= overlap, "overlap too large");
                assert!(b.end > a.end, "chunk does not advance");
            }
            for c in &chunks {
                assert!(c.char_len() <= size);
            }
            assert_eq!(reconstruct(&chunks), text, "size {} overlap {}", size, overlap);
        }
    }

    #[test]
    fn test_numbers_stay_with_units() {
        let text = reglement();
        let doc = Document::from_text("plu", text.as_str());
        let chunks = split_document(&doc, &params(50, 0)).unwrap();
        assert!(chunks.iter().any(|c| c.text.contains("9 mètres")));
        assert!(chunks.iter().any(|c| c.text.contains("60 %")));
    }

    #[test]
    fn test_line_break_after_number_is_not_a_boundary() {
        // PDF text extraction ends every visual line with '\n'.
        let text = "La hauteur est fixée à 9\nmètres au faîtage des toits.";
        let chunks = split_document(&Document::from_text("plu", text), &params(30, 0)).unwrap();
        assert!(
            chunks.iter().any(|c| c.text.contains("9\nmètres")),
            "{:?}",
            chunks.iter().map(|c| &c.text).collect::<Vec<_>>()
        );
        let joined: String = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(joined, text);

        let text = "Emprise maximale : 60\n\n% de la superficie du terrain.";
        let chunks = split_document(&Document::from_text("plu", text), &params(30, 0)).unwrap();
        assert!(chunks.iter().any(|c| c.text.contains("60\n\n%")));
    }

    #[test]
    fn test_trailing_whitespace_window_is_dropped() {
        let text = format!("Zone U1 hauteur 9 mètres.{}", " ".repeat(40));
        let chunks = split_document(&Document::from_text("plu", text.as_str()), &params(30, 0))
            .unwrap();
        assert!(chunks.iter().all(|c| !c.text.trim().is_empty()));
        let joined: String = chunks.iter().map(|c| c.text.as_str()).collect();
        assert!(text.starts_with(&joined));
        assert_eq!(joined.trim_end(), text.trim_end());
    }

    #[test]
    fn test_hard_cut_avoids_splitting_digits() {
        let doc = Document::from_text("doc1", "abcdefgh123456");
        let chunks = split_document(&doc, &params(10, 0)).unwrap();
        assert_eq!(chunks[0].text, "abcdefgh");
        assert_eq!(chunks[1].text, "123456");
    }

    #[test]
    fn test_hard_cut_all_digits() {
        let doc = Document::from_text("doc1", "12345678901234567890");
        let chunks = split_document(&doc, &params(8, 0)).unwrap();
        assert!(chunks.iter().all(|c| c.char_len() <= 8));
        let joined: String = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(joined, "12345678901234567890");
    }

    #[test]
    fn test_chunk_indices_contiguous_across_segments() {
        let doc = Document::new(
            "plu.pdf",
            vec![
                Segment {
                    text: reglement(),
                    page: Some(1),
                },
                Segment {
                    text: String::new(),
                    page: Some(2),
                },
                Segment {
                    text: reglement(),
                    page: Some(3),
                },
            ],
        );
        let chunks = split_document(&doc, &params(60, 0)).unwrap();
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.chunk_index, i, "Index mismatch at position {}", i);
            assert_eq!(c.document_id, "plu.pdf");
        }
        assert!(chunks.iter().any(|c| c.page == Some(3) && c.segment == 2));
        assert!(chunks.iter().all(|c| c.page != Some(2)));
    }

    #[test]
    fn test_multibyte_utf8_chars() {
        let text = "┌──────────────────┐\n│ Hauteur 9 mètres │\n└──────────────────┘";
        let doc = Document::from_text("doc1", text);
        let chunks = split_document(&doc, &params(7, 2)).unwrap();
        assert!(!chunks.is_empty());
        assert_eq!(reconstruct(&chunks), text);
    }

    #[test]
    fn test_deterministic() {
        let doc = Document::from_text("doc1", reglement());
        let c1 = split_document(&doc, &params(45, 10)).unwrap();
        let c2 = split_document(&doc, &params(45, 10)).unwrap();
        assert_eq!(c1, c2);
    }
}
