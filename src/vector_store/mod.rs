//! Per-video vector indexes and their on-disk cache.
//!
//! An index is built once per video from its chunks and persisted under a key
//! derived from the video id. Later requests load the persisted index and
//! ignore any newly supplied chunks, so a changed transcript is not picked up.

mod file;
mod memory;
mod sqlite;

pub use file::FileIndexCache;
pub use memory::MemoryIndexCache;
pub use sqlite::SqliteIndexCache;

use crate::chunking::Chunk;
use crate::config::{IndexBackend, Settings};
use crate::embedding::Embedder;
use crate::error::{Result, TubeQaError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// A chunk paired with its embedding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub embedding: Vec<f32>,
}

/// Searchable embeddings of one video's chunks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorIndex {
    pub video_id: String,
    /// Embedding model the index was built with.
    pub model: String,
    pub dimensions: usize,
    pub built_at: DateTime<Utc>,
    /// Entries in chunk construction order.
    pub entries: Vec<IndexEntry>,
}

/// A chunk with its similarity to a query (higher is closer).
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

impl VectorIndex {
    pub fn new(video_id: &str, model: &str, entries: Vec<IndexEntry>) -> Self {
        let dimensions = entries.first().map(|e| e.embedding.len()).unwrap_or(0);
        Self {
            video_id: video_id.to_string(),
            model: model.to_string(),
            dimensions,
            built_at: Utc::now(),
            entries,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The `k` entries most similar to `query`, best first.
    ///
    /// Exact cosine similarity over every entry; equal scores keep chunk order.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<ScoredChunk> {
        let mut scored: Vec<(usize, f32)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                let score = cosine_similarity(query, &entry.embedding);
                (i, if score.is_nan() { f32::NEG_INFINITY } else { score })
            })
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1));

        scored
            .into_iter()
            .take(k)
            .map(|(i, score)| ScoredChunk {
                chunk: self.entries[i].chunk.clone(),
                score,
            })
            .collect()
    }
}

/// Summary of a persisted index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedIndex {
    pub video_id: String,
    pub model: String,
    pub chunk_count: usize,
    pub built_at: DateTime<Utc>,
}

impl From<&VectorIndex> for CachedIndex {
    fn from(index: &VectorIndex) -> Self {
        Self {
            video_id: index.video_id.clone(),
            model: index.model.clone(),
            chunk_count: index.entries.len(),
            built_at: index.built_at,
        }
    }
}

/// Persistence for built indexes, keyed by video id.
///
/// `save` must publish atomically: a concurrent `load` sees either the old
/// index, the new one, or nothing, never a partial write. The last writer wins.
#[async_trait]
pub trait IndexCache: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Load a persisted index. `Ok(None)` if there is none; a
    /// `TubeQaError::Json` error if the stored entry cannot be decoded.
    async fn load(&self, video_id: &str) -> Result<Option<VectorIndex>>;

    /// Persist an index, replacing any previous one for the same video.
    async fn save(&self, index: &VectorIndex) -> Result<()>;

    /// Remove a persisted index. Returns whether one existed.
    async fn remove(&self, video_id: &str) -> Result<bool>;

    /// List persisted indexes, sorted by video id.
    async fn list(&self) -> Result<Vec<CachedIndex>>;
}

/// Create the index cache selected in the settings.
pub fn create_cache(settings: &Settings) -> Result<Arc<dyn IndexCache>> {
    let dir = settings.cache_dir();
    Ok(match settings.index.backend {
        IndexBackend::File => Arc::new(FileIndexCache::new(dir)),
        IndexBackend::Sqlite => Arc::new(SqliteIndexCache::open(&dir)?),
    })
}

/// Builds indexes from chunks or loads them from the cache.
pub struct IndexStore {
    cache: Arc<dyn IndexCache>,
    embedder: Arc<dyn Embedder>,
}

impl IndexStore {
    pub fn new(cache: Arc<dyn IndexCache>, embedder: Arc<dyn Embedder>) -> Self {
        Self { cache, embedder }
    }

    pub fn cache(&self) -> Arc<dyn IndexCache> {
        self.cache.clone()
    }

    /// Return the cached index for `video_id`, or build and persist one from `chunks`.
    ///
    /// A cached index is returned as-is and `chunks` is ignored.
    #[instrument(skip(self, chunks), fields(chunks = chunks.len()))]
    pub async fn get_or_build(&self, video_id: &str, chunks: &[Chunk]) -> Result<VectorIndex> {
        validate_video_id(video_id)?;

        match self.cache.load(video_id).await {
            Ok(Some(index)) => {
                info!("Loading cached index for {} ({} chunks)", video_id, index.len());
                return Ok(index);
            }
            Ok(None) => {}
            Err(TubeQaError::Json(e)) => {
                warn!("Cached index for {} is unreadable, rebuilding: {}", video_id, e);
            }
            Err(e) => return Err(unavailable(e)),
        }

        self.build(video_id, chunks).await
    }

    /// Embed `chunks`, persist the index and return it, replacing any cached one.
    #[instrument(skip(self, chunks), fields(chunks = chunks.len()))]
    pub async fn build(&self, video_id: &str, chunks: &[Chunk]) -> Result<VectorIndex> {
        validate_video_id(video_id)?;
        info!("Building index for {} with {}", video_id, self.embedder.model());

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await.map_err(unavailable)?;

        if embeddings.len() != chunks.len() {
            return Err(TubeQaError::IndexUnavailable(format!(
                "Expected {} embeddings, got {}",
                chunks.len(),
                embeddings.len()
            )));
        }

        let entries = chunks
            .iter()
            .cloned()
            .zip(embeddings)
            .map(|(chunk, embedding)| IndexEntry { chunk, embedding })
            .collect();

        let index = VectorIndex::new(video_id, self.embedder.model(), entries);
        self.cache.save(&index).await.map_err(unavailable)?;

        info!("Persisted index for {} via {} cache", video_id, self.cache.name());
        Ok(index)
    }
}

fn validate_video_id(video_id: &str) -> Result<()> {
    if video_id.trim().is_empty() {
        return Err(TubeQaError::InvalidInput("Video ID must not be empty".to_string()));
    }
    Ok(())
}

/// Fold any backend error into `IndexUnavailable`.
fn unavailable(err: TubeQaError) -> TubeQaError {
    match err {
        TubeQaError::IndexUnavailable(_) => err,
        other => TubeQaError::index(other),
    }
}

/// Encode a video id as a file-name-safe key.
///
/// ASCII alphanumerics, `-` and `_` pass through; every other byte becomes
/// `~xx`. Distinct ids always produce distinct keys.
pub fn cache_key(video_id: &str) -> String {
    let mut key = String::with_capacity(video_id.len());
    for byte in video_id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            key.push(byte as char);
        } else {
            key.push_str(&format!("~{:02x}", byte));
        }
    }
    key
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{chunks_from, FailingEmbedder, HashEmbedder};

    #[test]
    fn test_cosine_similarity() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &b) - 1.0).abs() < 0.001);

        let c = vec![0.0, 1.0, 0.0];
        assert!((cosine_similarity(&a, &c)).abs() < 0.001);

        let d = vec![-1.0, 0.0, 0.0];
        assert!((cosine_similarity(&a, &d) + 1.0).abs() < 0.001);

        assert_eq!(cosine_similarity(&a, &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_search_orders_by_similarity() {
        let entries = vec![
            IndexEntry { chunk: Chunk::new("x".into(), 0.0, 0), embedding: vec![0.0, 1.0] },
            IndexEntry { chunk: Chunk::new("y".into(), 5.0, 1), embedding: vec![1.0, 0.0] },
            IndexEntry { chunk: Chunk::new("z".into(), 9.0, 2), embedding: vec![0.7, 0.7] },
        ];
        let index = VectorIndex::new("vid", "test", entries);

        let results = index.search(&[1.0, 0.0], 3);
        let texts: Vec<_> = results.iter().map(|r| r.chunk.text.as_str()).collect();
        assert_eq!(texts, vec!["y", "z", "x"]);
        assert!(results[0].score >= results[1].score);

        assert_eq!(index.search(&[1.0, 0.0], 1).len(), 1);
        assert_eq!(index.dimensions, 2);
    }

    #[test]
    fn test_search_ties_keep_chunk_order() {
        let entries = (0..4)
            .map(|i| IndexEntry {
                chunk: Chunk::new(format!("c{}", i), i as f64, i),
                embedding: vec![1.0, 1.0],
            })
            .collect();
        let index = VectorIndex::new("vid", "test", entries);

        let results = index.search(&[1.0, 1.0], 3);
        let orders: Vec<_> = results.iter().map(|r| r.chunk.order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
    }

    #[test]
    fn test_cache_key_is_injective_and_safe() {
        assert_eq!(cache_key("dQw4w9WgXcQ"), "dQw4w9WgXcQ");
        assert_eq!(cache_key("a/b"), "a~2fb");
        assert_ne!(cache_key("a/b"), cache_key("a_b"));
        assert_ne!(cache_key("a~2fb"), cache_key("a/b"));
        assert!(!cache_key("../../etc").contains('/'));
    }

    #[tokio::test]
    async fn test_get_or_build_reuses_cached_index() {
        let cache = Arc::new(MemoryIndexCache::new());
        let embedder = Arc::new(HashEmbedder::new(32));
        let store = IndexStore::new(cache.clone(), embedder.clone());

        let chunks = chunks_from(&["neural networks learn", "cooking pasta tonight"]);
        let first = store.get_or_build("vid1", &chunks).await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(embedder.calls(), 1);

        // Different chunks are ignored once an index is cached
        let other = chunks_from(&["something else entirely"]);
        let second = store.get_or_build("vid1", &other).await.unwrap();
        assert_eq!(second.len(), 2);
        assert_eq!(embedder.calls(), 1);

        let query = embedder.embed("neural networks").await.unwrap();
        let a: Vec<_> = first.search(&query, 3).into_iter().map(|r| r.chunk).collect();
        let b: Vec<_> = second.search(&query, 3).into_iter().map(|r| r.chunk).collect();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_embedding_failure_is_index_unavailable() {
        let store = IndexStore::new(Arc::new(MemoryIndexCache::new()), Arc::new(FailingEmbedder));
        let err = store
            .get_or_build("vid1", &chunks_from(&["text"]))
            .await
            .unwrap_err();
        assert!(matches!(err, TubeQaError::IndexUnavailable(_)));
    }

    #[tokio::test]
    async fn test_empty_video_id_rejected() {
        let store = IndexStore::new(Arc::new(MemoryIndexCache::new()), Arc::new(HashEmbedder::new(8)));
        let err = store.get_or_build("  ", &[]).await.unwrap_err();
        assert!(matches!(err, TubeQaError::InvalidInput(_)));
    }

    async fn build_concurrently(stores: Vec<Arc<IndexStore>>, tasks: usize) -> Vec<VectorIndex> {
        let chunks = chunks_from(&["first part", "second part", "third part"]);
        let handles: Vec<_> = (0..tasks)
            .map(|i| {
                let store = stores[i % stores.len()].clone();
                let chunks = chunks.clone();
                tokio::spawn(async move { store.get_or_build("vid", &chunks).await })
            })
            .collect();

        let mut built = Vec::new();
        for handle in handles {
            built.push(handle.await.unwrap().unwrap());
        }
        built
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_builds_with_file_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(FileIndexCache::new(dir.path().to_path_buf()));
        let store = Arc::new(IndexStore::new(cache.clone(), Arc::new(HashEmbedder::new(32))));

        let built = build_concurrently(vec![store], 16).await;

        assert!(built.iter().all(|index| index.len() == 3));
        assert_eq!(cache.load("vid").await.unwrap().unwrap().len(), 3);

        // Only the published index remains, no leftover temp files
        let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(files.len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_builds_with_sqlite_cache() {
        let dir = tempfile::tempdir().unwrap();
        // Two connections to the same database, like two processes
        let stores: Vec<Arc<IndexStore>> = (0..2)
            .map(|_| {
                let cache = Arc::new(SqliteIndexCache::open(dir.path()).unwrap());
                Arc::new(IndexStore::new(cache, Arc::new(HashEmbedder::new(32))))
            })
            .collect();

        let built = build_concurrently(stores.clone(), 16).await;

        assert!(built.iter().all(|index| index.len() == 3));
        let listed = stores[0].cache().list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].chunk_count, 3);
        assert_eq!(stores[1].cache().load("vid").await.unwrap().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_sqlite_cache_reused_through_get_or_build() {
        let dir = tempfile::tempdir().unwrap();
        let embedder = Arc::new(HashEmbedder::new(32));
        let store = IndexStore::new(
            Arc::new(SqliteIndexCache::open(dir.path()).unwrap()),
            embedder.clone(),
        );

        let chunks = chunks_from(&["alpha beta", "gamma delta"]);
        let first = store.get_or_build("vid", &chunks).await.unwrap();
        let second = store.get_or_build("vid", &chunks_from(&["other"])).await.unwrap();

        assert_eq!(embedder.calls(), 1);
        let first_chunks: Vec<_> = first.entries.iter().map(|e| e.chunk.clone()).collect();
        let second_chunks: Vec<_> = second.entries.iter().map(|e| e.chunk.clone()).collect();
        assert_eq!(first_chunks, second_chunks);
    }

    #[tokio::test]
    async fn test_unreadable_cache_entry_is_rebuilt() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("vid1.index.json"), "{ not json").unwrap();

        let cache = Arc::new(FileIndexCache::new(dir.path().to_path_buf()));
        let store = IndexStore::new(cache.clone(), Arc::new(HashEmbedder::new(16)));

        let index = store.get_or_build("vid1", &chunks_from(&["fresh"])).await.unwrap();
        assert_eq!(index.len(), 1);
        assert!(cache.load("vid1").await.unwrap().is_some());
    }
}
