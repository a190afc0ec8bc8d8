//! Deterministic stand-ins for the external services, used by unit tests.

use crate::chunking::Chunk;
use crate::embedding::Embedder;
use crate::error::{Result, TubeQaError};
use crate::llm::{FragmentStream, LanguageModel, Prompt};
use crate::transcript::{TranscriptEntry, TranscriptSource};
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Chunks with starts 0, 10, 20, ... in order.
pub fn chunks_from(texts: &[&str]) -> Vec<Chunk> {
    texts
        .iter()
        .enumerate()
        .map(|(i, t)| Chunk::new(t.to_string(), i as f64 * 10.0, i))
        .collect()
}

/// Bag-of-words embedder: each lowercase word bumps one hashed dimension.
pub struct HashEmbedder {
    dimensions: usize,
    calls: AtomicUsize,
}

impl HashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of `embed` / `embed_batch` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn vector(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0; self.dimensions];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            // FNV-1a
            let hash = word
                .to_lowercase()
                .bytes()
                .fold(0xcbf29ce484222325u64, |h, b| (h ^ b as u64).wrapping_mul(0x100000001b3));
            v[(hash % self.dimensions as u64) as usize] += 1.0;
        }
        v
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.vector(text))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }

    fn model(&self) -> &str {
        "hash"
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Embedder whose backend is always down.
pub struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(TubeQaError::OpenAI("connection refused".to_string()))
    }

    async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(TubeQaError::OpenAI("connection refused".to_string()))
    }

    fn model(&self) -> &str {
        "down"
    }

    fn dimensions(&self) -> usize {
        0
    }
}

/// Language model replaying fixed fragments, optionally failing at the end.
pub struct ScriptedModel {
    fragments: Vec<String>,
    fail_at_end: bool,
    calls: AtomicUsize,
    last_prompt: Mutex<Option<Prompt>>,
    last_temperature: Mutex<f32>,
}

impl ScriptedModel {
    pub fn new(fragments: &[&str]) -> Self {
        Self {
            fragments: fragments.iter().map(|f| f.to_string()).collect(),
            fail_at_end: false,
            calls: AtomicUsize::new(0),
            last_prompt: Mutex::new(None),
            last_temperature: Mutex::new(f32::NAN),
        }
    }

    /// Streams `fragments`, then yields an error instead of ending.
    pub fn failing_after(fragments: &[&str]) -> Self {
        Self {
            fail_at_end: true,
            ..Self::new(fragments)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<Prompt> {
        self.last_prompt.lock().unwrap().clone()
    }

    pub fn last_temperature(&self) -> f32 {
        *self.last_temperature.lock().unwrap()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn model(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, prompt: &Prompt, temperature: f32) -> Result<FragmentStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_prompt.lock().unwrap() = Some(prompt.clone());
        *self.last_temperature.lock().unwrap() = temperature;

        let mut items: Vec<Result<String>> = self.fragments.iter().cloned().map(Ok).collect();
        if self.fail_at_end {
            items.push(Err(TubeQaError::OpenAI("stream reset".to_string())));
        }
        Ok(futures::stream::iter(items).boxed())
    }
}

/// Transcript source serving a fixed transcript for any video.
pub struct StaticTranscriptSource {
    entries: Option<Vec<TranscriptEntry>>,
    fetches: AtomicUsize,
}

impl StaticTranscriptSource {
    pub fn new(entries: Vec<TranscriptEntry>) -> Self {
        Self {
            entries: Some(entries),
            fetches: AtomicUsize::new(0),
        }
    }

    /// A source whose fetch always errors.
    pub fn failing() -> Self {
        Self {
            entries: None,
            fetches: AtomicUsize::new(0),
        }
    }

    /// Number of `fetch` calls so far.
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TranscriptSource for StaticTranscriptSource {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn fetch(&self, video_id: &str) -> Result<Vec<TranscriptEntry>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        self.entries
            .clone()
            .ok_or_else(|| TubeQaError::TranscriptUnavailable(format!("no captions for {}", video_id)))
    }
}
