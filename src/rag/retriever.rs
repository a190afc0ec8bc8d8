//! Nearest-neighbour retrieval over a video index.

use super::RetrievedPassage;
use crate::embedding::Embedder;
use crate::error::Result;
use crate::vector_store::VectorIndex;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Finds the chunks of an index closest to a question.
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    k: usize,
}

impl Retriever {
    /// Create a retriever returning the default 3 passages.
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder, k: 3 }
    }

    /// Set the number of passages returned.
    pub fn with_k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }

    /// Up to `k` passages ordered by descending similarity to `question`.
    ///
    /// Empty only when the index is empty.
    #[instrument(skip(self, index), fields(video_id = %index.video_id, k = self.k))]
    pub async fn retrieve(&self, index: &VectorIndex, question: &str) -> Result<Vec<RetrievedPassage>> {
        if index.is_empty() || self.k == 0 {
            return Ok(Vec::new());
        }

        let query_embedding = self.embedder.embed(question).await?;

        let passages: Vec<RetrievedPassage> = index
            .search(&query_embedding, self.k)
            .into_iter()
            .enumerate()
            .map(|(rank, scored)| RetrievedPassage {
                chunk: scored.chunk,
                similarity_rank: rank,
                score: scored.score,
            })
            .collect();

        debug!("Retrieved {} passages", passages.len());
        Ok(passages)
    }
}
