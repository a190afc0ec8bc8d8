//! Retrieval-augmented question answering over one video's transcript.
//!
//! The [`Retriever`] finds the passages closest to a question and the
//! [`AnswerSynthesizer`] turns them into an answer with provenance timestamps.

mod retriever;
mod synthesizer;

pub use retriever::Retriever;
pub use synthesizer::AnswerSynthesizer;

use crate::chunking::{format_timestamp, Chunk};
use crate::llm::Role;
use serde::{Deserialize, Serialize};

/// Answer returned when no passage could be retrieved.
pub const NO_ANSWER: &str = "I don't know.";

/// Answer returned when the video has no transcript.
pub const NO_TRANSCRIPT: &str = "Transcript not available for this video.";

/// A prior turn of the conversation, supplied by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A retrieved chunk and its position in the similarity ranking (0 is best).
#[derive(Debug, Clone)]
pub struct RetrievedPassage {
    pub chunk: Chunk,
    pub similarity_rank: usize,
    pub score: f32,
}

/// A point in the video supporting the answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timestamp {
    /// Offset in seconds.
    pub start: f64,
    /// Truncated preview of the supporting passage.
    pub text: String,
}

impl Timestamp {
    /// `MM:SS` or `HH:MM:SS` form of `start`.
    pub fn label(&self) -> String {
        format_timestamp(self.start)
    }

    /// Link to the moment in a YouTube video.
    pub fn youtube_url(&self, video_id: &str) -> String {
        format!(
            "https://youtube.com/watch?v={}&t={}s",
            video_id,
            self.start.max(0.0) as u32
        )
    }
}

/// The answer to one question and its supporting timestamps, ascending by start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagResult {
    pub answer: String,
    pub timestamps: Vec<Timestamp>,
}

impl RagResult {
    /// A result with a fixed answer and no timestamps.
    pub fn fallback(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            timestamps: Vec::new(),
        }
    }
}
