//! Configuration settings for tubeqa.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub provider: ProviderSettings,
    pub transcript: TranscriptSettings,
    pub chunking: ChunkingSettings,
    pub embedding: EmbeddingSettings,
    pub index: IndexSettings,
    pub rag: RagSettings,
    pub server: ServerSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.tubeqa".to_string(),
            log_level: "warn".to_string(),
        }
    }
}

/// Settings for the OpenAI-compatible API provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// Base URL override, e.g. `http://localhost:11434/v1` for Ollama.
    pub api_base: Option<String>,
    /// Request timeout in seconds.
    pub timeout_seconds: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            api_base: None,
            timeout_seconds: crate::openai::DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl ProviderSettings {
    /// Whether requests go to the hosted OpenAI API (and so need a key).
    pub fn uses_hosted_openai(&self) -> bool {
        self.api_base
            .as_deref()
            .map_or(true, |base| base.is_empty() || base.contains("api.openai.com"))
    }
}

/// Where transcripts come from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptSourceKind {
    /// Captions fetched from YouTube with yt-dlp.
    #[default]
    Youtube,
    /// `<video_id>.json` files in a local directory.
    File,
}

/// Transcript acquisition settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptSettings {
    pub source: TranscriptSourceKind,
    /// Caption languages to request, in preference order.
    pub languages: Vec<String>,
    /// Directory holding `<video_id>.json` transcripts (file source).
    pub transcripts_dir: String,
}

impl Default for TranscriptSettings {
    fn default() -> Self {
        Self {
            source: TranscriptSourceKind::Youtube,
            languages: vec!["en".to_string()],
            transcripts_dir: "~/.tubeqa/transcripts".to_string(),
        }
    }
}

/// Transcript chunking settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    /// Maximum characters per chunk before a new one is started.
    pub chunk_size: usize,
    /// Characters carried over from the end of one chunk into the next.
    pub chunk_overlap: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            chunk_overlap: 100,
        }
    }
}

/// Embedding generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Embedding model to use.
    pub model: String,
    /// Embedding dimensions.
    pub dimensions: u32,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
        }
    }
}

/// Index persistence backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IndexBackend {
    /// One JSON file per video, replaced atomically.
    #[default]
    File,
    /// A single SQLite database in the cache directory.
    Sqlite,
}

impl std::fmt::Display for IndexBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexBackend::File => write!(f, "file"),
            IndexBackend::Sqlite => write!(f, "sqlite"),
        }
    }
}

/// Vector index cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    pub backend: IndexBackend,
    /// Directory for persisted indexes, created on first use.
    pub cache_dir: String,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            backend: IndexBackend::File,
            cache_dir: "~/.tubeqa/index_cache".to_string(),
        }
    }
}

/// RAG (Retrieval-Augmented Generation) settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagSettings {
    /// LLM model for answer generation.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Number of passages retrieved per question.
    pub top_k: usize,
    /// Characters of chunk text shown in each timestamp preview.
    pub preview_chars: usize,
}

impl Default for RagSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            temperature: 0.2,
            top_k: 3,
            preview_chars: 120,
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        let settings = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str::<Settings>(&content)?
        } else {
            Settings::default()
        };

        settings.validate()?;
        Ok(settings)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.rag.top_k == 0 {
            return Err(crate::error::TubeQaError::Config(
                "rag.top_k must be at least 1".to_string(),
            ));
        }
        if self.chunking.chunk_size == 0 {
            return Err(crate::error::TubeQaError::Config(
                "chunking.chunk_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> crate::error::Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::TubeQaError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tubeqa")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded index cache directory.
    pub fn cache_dir(&self) -> PathBuf {
        Self::expand_path(&self.index.cache_dir)
    }

    /// Get the expanded transcripts directory (file source).
    pub fn transcripts_dir(&self) -> PathBuf {
        Self::expand_path(&self.transcript.transcripts_dir)
    }
}
