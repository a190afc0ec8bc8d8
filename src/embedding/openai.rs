//! OpenAI-compatible embeddings implementation.

use super::Embedder;
use crate::config::{EmbeddingSettings, ProviderSettings};
use crate::error::{Result, TubeQaError};
use crate::openai::create_client;
use async_openai::types::{CreateEmbeddingRequestArgs, EmbeddingInput};
use async_trait::async_trait;
use tracing::{debug, instrument};

/// Embedder backed by an OpenAI-compatible `/embeddings` endpoint.
pub struct OpenAIEmbedder {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    dimensions: usize,
}

impl OpenAIEmbedder {
    /// Create an embedder from settings.
    pub fn from_settings(provider: &ProviderSettings, embedding: &EmbeddingSettings) -> Result<Self> {
        Ok(Self {
            client: create_client(provider)?,
            model: embedding.model.clone(),
            dimensions: embedding.dimensions as usize,
        })
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    #[instrument(skip(self, text))]
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let embeddings = self.embed_batch(&[text.to_string()]).await?;
        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| TubeQaError::IndexUnavailable("Empty embedding response".to_string()))
    }

    #[instrument(skip(self, texts), fields(count = texts.len()))]
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());

        // Providers cap the batch size, process in chunks
        const BATCH_SIZE: usize = 100;
        let mut all_embeddings = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(BATCH_SIZE) {
            let request = CreateEmbeddingRequestArgs::default()
                .model(&self.model)
                .input(EmbeddingInput::StringArray(chunk.to_vec()))
                .dimensions(self.dimensions as u32)
                .build()
                .map_err(|e| TubeQaError::IndexUnavailable(format!("Failed to build request: {}", e)))?;

            let response = self.client.embeddings().create(request).await.map_err(|e| {
                TubeQaError::IndexUnavailable(format!("Embedding API error: {}", e))
            })?;

            if response.data.len() != chunk.len() {
                return Err(TubeQaError::IndexUnavailable(format!(
                    "Embedding API returned {} vectors for {} inputs",
                    response.data.len(),
                    chunk.len()
                )));
            }

            // Sort by index to ensure correct order
            let mut embeddings: Vec<_> = response.data.into_iter().collect();
            embeddings.sort_by_key(|e| e.index);
            all_embeddings.extend(embeddings.into_iter().map(|e| e.embedding));
        }

        debug!("Generated {} embeddings", all_embeddings.len());
        Ok(all_embeddings)
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
