//! Configuration module for tubeqa.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{Prompts, RagPrompts};
pub use settings::{
    ChunkingSettings, EmbeddingSettings, GeneralSettings, IndexBackend, IndexSettings,
    PromptSettings, ProviderSettings, RagSettings, ServerSettings, Settings,
    TranscriptSettings, TranscriptSourceKind,
};
