//! Overlapping character-window chunking.

use super::{Chunk, ChunkingConfig};
use crate::transcript::TranscriptEntry;
use tracing::debug;

/// Groups caption lines into windows of at most `chunk_size` characters.
///
/// When the next line would overflow the window, the window is closed and the
/// next one is seeded with the last `chunk_overlap` characters of the closed
/// window's text. A single line longer than `chunk_size` becomes its own chunk.
/// Lengths are counted in characters, not bytes.
#[derive(Debug, Clone, Default)]
pub struct WindowChunker {
    config: ChunkingConfig,
}

impl WindowChunker {
    pub fn new(config: ChunkingConfig) -> Self {
        Self { config }
    }

    /// Split an ordered transcript into chunks.
    pub fn chunk(&self, transcript: &[TranscriptEntry]) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let mut parts: Vec<&str> = Vec::new();
        let mut overlap = String::new();
        let mut char_count = 0usize;
        let mut current_start: Option<f64> = None;

        for entry in transcript {
            let text = entry.text.as_str();
            let len = text.chars().count();

            if current_start.is_none() {
                current_start = Some(entry.start);
            }

            if parts.is_empty() || char_count + len <= self.config.chunk_size {
                parts.push(text);
                char_count += len;
                continue;
            }

            let joined = join_parts(&overlap, &parts);
            overlap = tail_chars(&joined, self.config.chunk_overlap).to_string();
            chunks.push(Chunk::new(
                joined,
                current_start.unwrap_or(entry.start),
                chunks.len(),
            ));

            parts.clear();
            parts.push(text);
            char_count = overlap.chars().count() + len;
            current_start = Some(entry.start);
        }

        if !parts.is_empty() {
            let joined = join_parts(&overlap, &parts);
            chunks.push(Chunk::new(joined, current_start.unwrap_or(0.0), chunks.len()));
        }

        debug!(
            entries = transcript.len(),
            chunks = chunks.len(),
            chunk_size = self.config.chunk_size,
            "Transcript chunked"
        );

        chunks
    }
}

/// Join the carried-over tail and the window's lines with single spaces.
fn join_parts(overlap: &str, parts: &[&str]) -> String {
    let lines = parts.join(" ");
    if overlap.is_empty() {
        lines
    } else {
        format!("{} {}", overlap, lines)
    }
}

/// The last `n` characters of `text`, cut on a char boundary.
fn tail_chars(text: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    match text.char_indices().rev().nth(n - 1) {
        Some((idx, _)) => &text[idx..],
        None => text,
    }
}
