//! Error types for tubeqa.

use thiserror::Error;

/// Library-level error type for tubeqa operations.
#[derive(Error, Debug)]
pub enum TubeQaError {
    #[error("Configuration error: {0}")]
    Config(String),

    /// No usable transcript for a video. The pipeline turns this into a
    /// fallback answer rather than surfacing it.
    #[error("Transcript unavailable: {0}")]
    TranscriptUnavailable(String),

    /// The embedding or index persistence backend failed.
    #[error("Index unavailable: {0}")]
    IndexUnavailable(String),

    /// The language model failed before finishing its answer.
    #[error("Generation failed: {message}")]
    GenerationFailed {
        message: String,
        /// Text streamed before the failure, possibly empty.
        partial: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("OpenAI API error: {0}")]
    OpenAI(String),

    #[error("External tool not found: {0}. Please install it and ensure it's in your PATH.")]
    ToolNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl TubeQaError {
    /// Wrap any persistence-side failure as `IndexUnavailable`.
    pub fn index(err: impl std::fmt::Display) -> Self {
        TubeQaError::IndexUnavailable(err.to_string())
    }
}

/// Result type alias for tubeqa operations.
pub type Result<T> = std::result::Result<T, TubeQaError>;
