//! OpenAI-compatible client configuration.
//!
//! The same client talks to OpenAI or to any server exposing the OpenAI API
//! (Ollama serves one at `http://localhost:11434/v1`).

use crate::config::ProviderSettings;
use crate::error::{Result, TubeQaError};
use async_openai::{config::OpenAIConfig, Client};
use std::time::Duration;

/// Default timeout for API requests (5 minutes).
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Create a client from provider settings.
pub fn create_client(provider: &ProviderSettings) -> Result<Client<OpenAIConfig>> {
    let timeout = Duration::from_secs(provider.timeout_seconds.max(1));
    let http_client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| TubeQaError::Config(format!("Failed to create HTTP client: {}", e)))?;

    let mut config = OpenAIConfig::default();
    if let Some(base) = provider.api_base.as_deref().filter(|b| !b.is_empty()) {
        config = config.with_api_base(base);
    }

    Ok(Client::with_config(config).with_http_client(http_client))
}
