//! Text splitting for retrieval and summarization.
//!
//! Retrieval chunks are character windows of at most [`CHUNK_SIZE`] characters that overlap by at
//! most [`CHUNK_OVERLAP`] characters. Each window ends on the strongest boundary available past the
//! overlap zone: a blank line, then a line break, then a sentence end, then a space. Without any of
//! those the window is cut at exactly [`CHUNK_SIZE`] characters. Windows are slices of the input,
//! so dropping each window's overlap and concatenating reproduces the input byte for byte.
//!
//! Summaries use a different split: token-bounded spans produced by `semchunk-rs`, counted with a
//! `tiktoken-rs` encoding when one is available and a whitespace counter otherwise.

use anyhow::Error as TokenizerError;
use semchunk_rs::Chunker;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tiktoken_rs::{CoreBPE, cl100k_base, get_bpe_from_model, o200k_base, p50k_base, r50k_base};

use super::types::ChunkingError;
use crate::loader::{Segment, join_segments};

/// Maximum characters per retrieval chunk.
pub const CHUNK_SIZE: usize = 800;
/// Maximum characters shared by consecutive retrieval chunks.
pub const CHUNK_OVERLAP: usize = 150;

/// Boundary groups in priority order. Within a group the latest match wins.
const BOUNDARY_GROUPS: [&[&str]; 4] = [&["\n\n"], &["\n"], &[". ", "! ", "? "], &[" "]];

/// Counts tokens in a span of text.
pub type TokenCounter = Arc<dyn Fn(&str) -> usize + Send + Sync>;

/// A window over some input text, addressed by byte offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextWindow {
    /// Byte offset where the window starts.
    pub start: usize,
    /// Byte offset one past the window's last byte.
    pub end: usize,
    /// The window's text, equal to `input[start..end]`.
    pub text: String,
}

/// The unit of embedding: one window over one segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// Position of the chunk across the whole document.
    pub index: usize,
    /// Position of the segment this chunk came from.
    pub segment: usize,
    /// Byte offset of the chunk within its segment.
    pub start: usize,
    /// Byte offset one past the chunk's end within its segment.
    pub end: usize,
    /// Chunk text.
    pub text: String,
    /// SHA-256 hex digest of `text`.
    pub chunk_hash: String,
}

/// Output of [`chunk_segments`].
#[derive(Debug, Clone, Default)]
pub struct ChunkedDocument {
    /// Segment texts joined with newlines.
    pub raw_text: String,
    /// Chunks for every segment in source order.
    pub chunks: Vec<Chunk>,
}

/// Split text with the fixed retrieval parameters.
pub fn split_text(text: &str) -> Vec<TextWindow> {
    split_text_with(text, CHUNK_SIZE, CHUNK_OVERLAP)
}

/// Split text into windows of at most `size` characters overlapping by at most `overlap`.
///
/// Empty input yields no windows. Input of at most `size` characters yields one window holding
/// all of it. `overlap` is clamped below `size`.
pub fn split_text_with(text: &str, size: usize, overlap: usize) -> Vec<TextWindow> {
    if text.is_empty() || size == 0 {
        return Vec::new();
    }
    let overlap = overlap.min(size - 1);

    // Byte offset of every char boundary, including the end of the text.
    let offsets: Vec<usize> = text
        .char_indices()
        .map(|(offset, _)| offset)
        .chain(std::iter::once(text.len()))
        .collect();
    let total = offsets.len() - 1;

    let window = |start: usize, end: usize| TextWindow {
        start: offsets[start],
        end: offsets[end],
        text: text[offsets[start]..offsets[end]].to_string(),
    };

    let mut windows = Vec::new();
    let mut start = 0;
    loop {
        if total - start <= size {
            windows.push(window(start, total));
            break;
        }
        let hard_end = start + size;
        let end = boundary_end(text, &offsets, start + overlap + 1, hard_end).unwrap_or(hard_end);
        windows.push(window(start, end));
        start = overlap_start(text, &offsets, end, overlap);
    }
    windows
}

/// Latest boundary in `[min_end, hard_end]` (char indices) from the strongest group that has one.
fn boundary_end(text: &str, offsets: &[usize], min_end: usize, hard_end: usize) -> Option<usize> {
    let floor = offsets[min_end];
    let region_start = offsets[min_end.saturating_sub(2)];
    let region = &text[region_start..offsets[hard_end]];

    BOUNDARY_GROUPS.iter().find_map(|group| {
        group
            .iter()
            .filter_map(|separator| {
                region
                    .rfind(separator)
                    .map(|found| region_start + found + separator.len())
            })
            .filter(|&byte_end| byte_end >= floor)
            .max()
            .and_then(|byte_end| offsets.binary_search(&byte_end).ok())
    })
}

/// Start of the next window: `overlap` chars before `end`, moved up to the next word start when
/// the overlap zone contains whitespace.
fn overlap_start(text: &str, offsets: &[usize], end: usize, overlap: usize) -> usize {
    let candidate = end - overlap;
    let zone = &text[offsets[candidate]..offsets[end]];
    zone.char_indices()
        .find(|(_, ch)| *ch == ' ' || *ch == '\n')
        .map(|(offset, ch)| offsets[candidate] + offset + ch.len_utf8())
        .and_then(|byte_start| offsets.binary_search(&byte_start).ok())
        .filter(|&next| next < end)
        .unwrap_or(candidate)
}

/// Chunk every segment and build the document's raw text.
pub fn chunk_segments(segments: &[Segment]) -> ChunkedDocument {
    let mut chunks = Vec::new();
    for segment in segments {
        for window in split_text(&segment.text) {
            chunks.push(Chunk {
                index: chunks.len(),
                segment: segment.position,
                start: window.start,
                end: window.end,
                chunk_hash: compute_chunk_hash(&window.text),
                text: window.text,
            });
        }
    }
    ChunkedDocument {
        raw_text: join_segments(segments),
        chunks,
    }
}

/// Compute a deterministic SHA-256 hash for the chunk text.
pub fn compute_chunk_hash(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// Split text into spans of at most `token_budget` tokens for map-reduce summarization.
///
/// Returns an empty vector when the input is all whitespace.
pub fn partition_for_summary(
    text: &str,
    token_budget: usize,
    token_counter: TokenCounter,
) -> Result<Vec<String>, ChunkingError> {
    if token_budget == 0 {
        return Err(ChunkingError::InvalidChunkSize);
    }
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    let chunker = Chunker::new(
        token_budget,
        Box::new(move |segment: &str| token_counter.as_ref()(segment)),
    );
    Ok(chunker.chunk(text))
}

/// Build a token counter for the given generation model.
///
/// Uses the model's OpenAI encoding when known and `cl100k_base` otherwise. When no encoding can be
/// loaded at all, falls back to counting whitespace-separated words.
pub fn build_token_counter(model: &str) -> TokenCounter {
    match build_tiktoken_counter(model) {
        Ok(counter) => counter,
        Err(error) => {
            tracing::warn!(
                model,
                error = %error,
                "Tokenizer unavailable; falling back to whitespace counter"
            );
            whitespace_token_counter()
        }
    }
}

fn build_tiktoken_counter(model: &str) -> Result<TokenCounter, ChunkingError> {
    let normalized = model.trim();
    let target = if normalized.is_empty() {
        "cl100k_base"
    } else {
        normalized
    };
    let encoding = resolve_encoding(target).map_err(|source| ChunkingError::Tokenizer {
        model: target.to_string(),
        source,
    })?;
    let encoding = Arc::new(encoding);

    Ok(Arc::new(move |segment: &str| {
        encoding.encode_ordinary(segment).len()
    }))
}

fn resolve_encoding(model: &str) -> Result<CoreBPE, TokenizerError> {
    match get_bpe_from_model(model) {
        Ok(encoding) => Ok(encoding),
        Err(model_err) => {
            tracing::debug!(
                model,
                error = %model_err,
                "Tokenizer model lookup failed; trying encoding name"
            );
            match model {
                "o200k_base" => o200k_base(),
                "p50k_base" => p50k_base(),
                "r50k_base" | "gpt2" => r50k_base(),
                _ => cl100k_base(),
            }
        }
    }
}

/// Counts whitespace-separated words, treating any non-empty text as at least one token.
pub fn whitespace_token_counter() -> TokenCounter {
    Arc::new(|segment: &str| {
        let tokens = segment.split_whitespace().count();
        if tokens == 0 && !segment.is_empty() {
            1
        } else {
            tokens
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reconstruct(windows: &[TextWindow]) -> String {
        let mut rebuilt = String::new();
        let mut previous_end = 0usize;
        for window in windows {
            let skip = previous_end.saturating_sub(window.start);
            rebuilt.push_str(&window.text[skip..]);
            previous_end = window.end;
        }
        rebuilt
    }

    fn long_prose() -> String {
        let sentence = "The committee reviewed the annual budget and approved three new projects. ";
        let mut text = String::new();
        for paragraph in 0..12 {
            for _ in 0..4 {
                text.push_str(sentence);
            }
            text.push_str(&format!("Paragraph {paragraph} ends here.\n\n"));
        }
        text
    }

    #[test]
    fn empty_text_has_no_windows() {
        assert!(split_text("").is_empty());
    }

    #[test]
    fn short_text_is_a_single_window() {
        let text = "Short note.\n\nWith two paragraphs.";
        let windows = split_text(text);
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].text, text);

        let exact = "x".repeat(CHUNK_SIZE);
        assert_eq!(split_text(&exact).len(), 1);
    }

    #[test]
    fn whitespace_only_text_still_produces_a_window() {
        let windows = split_text("   \n ");
        assert_eq!(windows.len(), 1);
        assert_eq!(windows[0].text, "   \n ");
    }

    #[test]
    fn windows_respect_size_and_overlap_bounds() {
        let text = long_prose();
        let windows = split_text(&text);
        assert!(windows.len() > 1);
        for window in &windows {
            assert!(window.text.chars().count() <= CHUNK_SIZE);
        }
        for pair in windows.windows(2) {
            assert!(pair[1].start > pair[0].start);
            assert!(pair[1].start < pair[0].end, "consecutive windows overlap");
            let shared = text[pair[1].start..pair[0].end].chars().count();
            assert!(shared <= CHUNK_OVERLAP);
        }
    }

    #[test]
    fn windows_prefer_paragraph_boundaries() {
        let text = long_prose();
        let windows = split_text(&text);
        for window in &windows[..windows.len() - 1] {
            assert!(window.text.ends_with("\n\n"), "{:?}", window.text);
        }
    }

    #[test]
    fn windows_reconstruct_the_input() {
        let prose = long_prose();
        let unbroken = "a".repeat(2_000);
        let accented = "Les élèves étudient l'économie à Genève. ".repeat(60);
        for text in [prose.as_str(), unbroken.as_str(), accented.as_str()] {
            let windows = split_text(text);
            assert_eq!(reconstruct(&windows), text);
        }
    }

    #[test]
    fn text_without_separators_is_hard_cut() {
        let text = "b".repeat(1_700);
        let windows = split_text(&text);
        assert_eq!(windows[0].text.len(), CHUNK_SIZE);
        assert_eq!(windows[1].start, CHUNK_SIZE - CHUNK_OVERLAP);
    }

    #[test]
    fn splitting_is_deterministic() {
        let text = long_prose();
        assert_eq!(split_text(&text), split_text(&text));
    }

    #[test]
    fn chunk_segments_tags_source_positions() {
        let segments = vec![
            Segment {
                position: 0,
                text: "First page.".into(),
            },
            Segment {
                position: 1,
                text: String::new(),
            },
            Segment {
                position: 2,
                text: long_prose(),
            },
        ];
        let chunked = chunk_segments(&segments);
        assert!(chunked.raw_text.starts_with("First page.\n\n"));
        assert_eq!(chunked.chunks[0].segment, 0);
        assert_eq!(chunked.chunks[0].text, "First page.");
        assert!(chunked.chunks[1..].iter().all(|chunk| chunk.segment == 2));
        for (position, chunk) in chunked.chunks.iter().enumerate() {
            assert_eq!(chunk.index, position);
            assert_eq!(chunk.chunk_hash, compute_chunk_hash(&chunk.text));
        }
    }

    #[test]
    fn summary_partition_respects_token_budget() {
        let counter = whitespace_token_counter();
        let text = "one two three four five six seven eight nine ten";
        let spans = partition_for_summary(text, 4, counter.clone()).unwrap();
        assert!(spans.len() >= 3);
        assert!(spans.iter().all(|span| counter(span) <= 4));
    }

    #[test]
    fn summary_partition_of_blank_text_is_empty() {
        let spans = partition_for_summary("  \n ", 100, whitespace_token_counter()).unwrap();
        assert!(spans.is_empty());
        assert!(partition_for_summary("text", 0, whitespace_token_counter()).is_err());
    }

    #[test]
    fn tiktoken_counter_counts_tokens() {
        let counter = build_token_counter("gpt-3.5-turbo-instruct");
        assert!(counter("hello world") >= 2);
        assert_eq!(counter(""), 0);
    }
}
