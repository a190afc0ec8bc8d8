//! Pipeline orchestrator for tubeqa.
//!
//! Runs one question end to end: transcript, chunks, index, retrieval, answer.

use crate::chunking::{ChunkingConfig, WindowChunker};
use crate::config::{Prompts, Settings};
use crate::embedding::{Embedder, OpenAIEmbedder};
use crate::error::Result;
use crate::llm::{LanguageModel, OpenAIChatModel};
use crate::rag::{AnswerSynthesizer, ChatTurn, RagResult, Retriever, NO_TRANSCRIPT};
use crate::transcript::{create_source, normalize_video_id, TranscriptEntry, TranscriptSource};
use crate::vector_store::{create_cache, IndexCache, IndexStore, VectorIndex};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// The question-answering pipeline.
pub struct Pipeline {
    source: Arc<dyn TranscriptSource>,
    chunker: WindowChunker,
    store: IndexStore,
    retriever: Retriever,
    synthesizer: AnswerSynthesizer,
}

impl Pipeline {
    /// Create a pipeline with the backends configured in `settings`.
    pub fn new(settings: &Settings) -> Result<Self> {
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;

        let embedder: Arc<dyn Embedder> = Arc::new(OpenAIEmbedder::from_settings(
            &settings.provider,
            &settings.embedding,
        )?);
        let llm: Arc<dyn LanguageModel> =
            Arc::new(OpenAIChatModel::new(&settings.provider, &settings.rag.model)?);

        let store = IndexStore::new(create_cache(settings)?, embedder.clone());
        let retriever = Retriever::new(embedder).with_k(settings.rag.top_k);
        let synthesizer = AnswerSynthesizer::new(llm)
            .with_prompts(prompts)
            .with_temperature(settings.rag.temperature)
            .with_preview_chars(settings.rag.preview_chars);

        Ok(Self::with_components(
            create_source(settings),
            WindowChunker::new(ChunkingConfig::from(&settings.chunking)),
            store,
            retriever,
            synthesizer,
        ))
    }

    /// Create a pipeline with custom components.
    pub fn with_components(
        source: Arc<dyn TranscriptSource>,
        chunker: WindowChunker,
        store: IndexStore,
        retriever: Retriever,
        synthesizer: AnswerSynthesizer,
    ) -> Self {
        Self {
            source,
            chunker,
            store,
            retriever,
            synthesizer,
        }
    }

    /// Get a reference to the index cache.
    pub fn cache(&self) -> Arc<dyn IndexCache> {
        self.store.cache()
    }

    /// Answer `question` about `video_id`.
    pub async fn run(
        &self,
        video_id: &str,
        question: &str,
        chat_history: &[ChatTurn],
    ) -> Result<RagResult> {
        self.run_with(video_id, question, chat_history, |_| {}).await
    }

    /// Like [`run`](Self::run), passing each streamed answer fragment to `on_fragment`.
    #[instrument(skip(self, question, chat_history, on_fragment))]
    pub async fn run_with<F>(
        &self,
        video_id: &str,
        question: &str,
        chat_history: &[ChatTurn],
        on_fragment: F,
    ) -> Result<RagResult>
    where
        F: FnMut(&str) + Send,
    {
        let video_id = normalize_video_id(video_id);

        let Some(index) = self.prepare_index(&video_id, false).await? else {
            return Ok(RagResult::fallback(NO_TRANSCRIPT));
        };

        self.answer_with(&index, question, chat_history, on_fragment).await
    }

    /// Answer `question` from an already prepared index.
    ///
    /// Lets a session fetch the transcript once and ask many questions.
    pub async fn answer_with<F>(
        &self,
        index: &VectorIndex,
        question: &str,
        chat_history: &[ChatTurn],
        on_fragment: F,
    ) -> Result<RagResult>
    where
        F: FnMut(&str) + Send,
    {
        let passages = self.retriever.retrieve(index, question).await?;
        let chunks: Vec<_> = passages.into_iter().map(|p| p.chunk).collect();

        self.synthesizer
            .synthesize_with(&chunks, question, chat_history, on_fragment)
            .await
    }

    /// Fetch, chunk and index a video. `None` when it has no transcript.
    ///
    /// With `force`, the cached index is rebuilt from the current transcript.
    #[instrument(skip(self))]
    pub async fn prepare_index(&self, video_id: &str, force: bool) -> Result<Option<VectorIndex>> {
        if video_id.trim().is_empty() {
            info!("Empty video id, no transcript to fetch");
            return Ok(None);
        }

        let transcript = self.fetch_transcript(video_id).await;
        if transcript.is_empty() {
            info!("No transcript for {}", video_id);
            return Ok(None);
        }

        let chunks = self.chunker.chunk(&transcript);
        info!("Chunked {} lines into {} chunks", transcript.len(), chunks.len());

        let index = if force {
            self.store.build(video_id, &chunks).await?
        } else {
            self.store.get_or_build(video_id, &chunks).await?
        };
        Ok(Some(index))
    }

    /// Fetch the transcript. Any failure counts as no transcript.
    async fn fetch_transcript(&self, video_id: &str) -> Vec<TranscriptEntry> {
        match self.source.fetch(video_id).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Could not retrieve transcript for {} via {}: {}", video_id, self.source.name(), e);
                Vec::new()
            }
        }
    }
}
