//! crates/doc_assistant_core/src/chunking.rs
//!
//! Ingestion-side text splitting and section bucketing.
//!
//! Documents are split into overlapping chunks at paragraph boundaries where
//! possible, falling back to sentence and then whitespace boundaries for
//! oversized pieces. The ordered chunk list is then tagged into three equal
//! contiguous thirds (`beginning`/`middle`/`end`); the remainder of the
//! integer division folds into the last bucket.

use crate::domain::{IndexableChunk, SectionTag};

/// Target chunk size in characters.
pub const CHUNK_SIZE: usize = 1000;
/// Characters carried over from the end of one chunk into the next.
pub const CHUNK_OVERLAP: usize = 200;

/// Splits a document body into indexing chunks of at most [`CHUNK_SIZE`]
/// characters, preferring paragraph boundaries and carrying [`CHUNK_OVERLAP`]
/// characters of context between adjacent chunks.
pub fn split_text(text: &str) -> Vec<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    if trimmed.len() <= CHUNK_SIZE {
        return vec![trimmed.to_string()];
    }

    let mut chunks = Vec::new();
    let mut buffer = String::new();

    for paragraph in trimmed.split("\n\n") {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }
        if paragraph.len() > CHUNK_SIZE {
            // Oversized paragraph: retry at sentence granularity.
            for sentence in sentences(paragraph) {
                append_piece(sentence, " ", &mut buffer, &mut chunks);
            }
            continue;
        }
        append_piece(paragraph, "\n\n", &mut buffer, &mut chunks);
    }

    flush(&mut buffer, &mut chunks);
    chunks
}

/// Tags an ordered chunk list into contiguous thirds.
pub fn bucket_sections(chunks: Vec<String>) -> Vec<IndexableChunk> {
    let total = chunks.len();
    chunks
        .into_iter()
        .enumerate()
        .map(|(index, text)| IndexableChunk {
            text,
            section: section_for_index(index, total),
        })
        .collect()
}

/// The positional bucket for chunk `index` out of `total` chunks.
///
/// `index < total/3` is `beginning`, `index < 2*total/3` is `middle`, the
/// rest (including the whole division remainder) is `end`.
pub fn section_for_index(index: usize, total: usize) -> SectionTag {
    let third = total / 3;
    if index < third {
        SectionTag::Beginning
    } else if index < 2 * third {
        SectionTag::Middle
    } else {
        SectionTag::End
    }
}

/// Appends one piece to the accumulation buffer, flushing a finished chunk
/// (and seeding the overlap carry) when the piece would not fit.
fn append_piece(piece: &str, separator: &str, buffer: &mut String, chunks: &mut Vec<String>) {
    if piece.len() > CHUNK_SIZE {
        // Whitespace-level fallback; hard_split carries its own overlap.
        flush(buffer, chunks);
        hard_split(piece, chunks);
        return;
    }

    let projected = if buffer.is_empty() {
        piece.len()
    } else {
        buffer.len() + separator.len() + piece.len()
    };
    if projected > CHUNK_SIZE && !buffer.is_empty() {
        let carry = overlap_tail(buffer).to_string();
        chunks.push(std::mem::take(buffer).trim().to_string());
        if carry.len() + separator.len() + piece.len() <= CHUNK_SIZE {
            buffer.push_str(&carry);
        }
    }

    if !buffer.is_empty() {
        buffer.push_str(separator);
    }
    buffer.push_str(piece);
}

fn flush(buffer: &mut String, chunks: &mut Vec<String>) {
    let chunk = std::mem::take(buffer);
    let chunk = chunk.trim();
    if !chunk.is_empty() {
        chunks.push(chunk.to_string());
    }
}

/// Splits a piece that exceeds [`CHUNK_SIZE`] on its own, cutting at
/// whitespace where possible and stepping back by the overlap each time.
fn hard_split(text: &str, chunks: &mut Vec<String>) {
    let mut start = 0usize;
    while start < text.len() {
        let limit = floor_boundary(text, start + CHUNK_SIZE);
        let end = if limit < text.len() {
            match text[start..limit].rfind(char::is_whitespace) {
                Some(pos) if pos > 0 => start + pos,
                _ => limit,
            }
        } else {
            text.len()
        };

        let piece = text[start..end].trim();
        if !piece.is_empty() {
            chunks.push(piece.to_string());
        }
        if end >= text.len() {
            break;
        }

        let next = end.saturating_sub(CHUNK_OVERLAP).max(start + 1);
        start = ceil_boundary(text, next);
    }
}

/// The trailing [`CHUNK_OVERLAP`] characters of a chunk, advanced to the
/// nearest word boundary.
fn overlap_tail(chunk: &str) -> &str {
    if chunk.len() <= CHUNK_OVERLAP {
        return chunk;
    }
    let start = ceil_boundary(chunk, chunk.len() - CHUNK_OVERLAP);
    match chunk[start..].find(char::is_whitespace) {
        Some(pos) => chunk[start + pos..].trim_start(),
        None => &chunk[start..],
    }
}

fn floor_boundary(s: &str, mut index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    while !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn ceil_boundary(s: &str, mut index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    while !s.is_char_boundary(index) {
        index += 1;
    }
    index
}

fn sentences(paragraph: &str) -> impl Iterator<Item = &str> {
    paragraph
        .split_inclusive(|c: char| matches!(c, '.' | '?' | '!'))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}
