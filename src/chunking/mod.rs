//! Transcript chunking for embedding and retrieval.
//!
//! Caption lines are short and numerous; they are grouped into overlapping
//! character windows, each tagged with the start time of the lines it opens with.

mod window;

pub use window::WindowChunker;

use serde::{Deserialize, Serialize};

/// A searchable span of transcript text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Text content, caption lines joined with spaces.
    pub text: String,
    /// Start time in seconds of the first line contributing new text.
    #[serde(default)]
    pub start: Option<f64>,
    /// Position of this chunk in construction order.
    #[serde(default)]
    pub order: usize,
}

impl Chunk {
    pub fn new(text: String, start: f64, order: usize) -> Self {
        Self {
            text,
            start: Some(start),
            order,
        }
    }

    /// Start time if it is present and finite.
    pub fn start_seconds(&self) -> Option<f64> {
        self.start.filter(|s| s.is_finite())
    }
}

/// Format seconds as MM:SS or HH:MM:SS.
pub fn format_timestamp(seconds: f64) -> String {
    let total_seconds = seconds.max(0.0) as u32;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;

    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{:02}:{:02}", minutes, secs)
    }
}

/// Configuration for chunking.
#[derive(Debug, Clone, Copy)]
pub struct ChunkingConfig {
    /// Maximum characters accumulated before a chunk is closed.
    pub chunk_size: usize,
    /// Trailing characters of a closed chunk that seed the next one.
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            chunk_overlap: 100,
        }
    }
}

impl From<&crate::config::ChunkingSettings> for ChunkingConfig {
    fn from(settings: &crate::config::ChunkingSettings) -> Self {
        Self {
            chunk_size: settings.chunk_size,
            chunk_overlap: settings.chunk_overlap,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(125.0), "02:05");
        assert_eq!(format_timestamp(3725.4), "01:02:05");
        assert_eq!(format_timestamp(0.0), "00:00");
    }

    #[test]
    fn test_non_finite_start_is_undefined() {
        let mut chunk = Chunk::new("text".to_string(), f64::NAN, 0);
        assert_eq!(chunk.start_seconds(), None);
        chunk.start = None;
        assert_eq!(chunk.start_seconds(), None);
    }

    #[test]
    fn test_chunk_without_start_deserializes() {
        let chunk: Chunk = serde_json::from_str(r#"{"text":"imported"}"#).unwrap();
        assert_eq!(chunk.start, None);
        assert_eq!(chunk.order, 0);
    }
}
