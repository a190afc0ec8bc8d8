//! In-memory index cache.
//!
//! Useful for testing and for one-off runs that should not touch disk.

use super::{CachedIndex, IndexCache, VectorIndex};
use crate::error::{Result, TubeQaError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory index cache.
pub struct MemoryIndexCache {
    indexes: RwLock<HashMap<String, VectorIndex>>,
}

impl MemoryIndexCache {
    pub fn new() -> Self {
        Self {
            indexes: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryIndexCache {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(e: std::sync::PoisonError<T>) -> TubeQaError {
    TubeQaError::IndexUnavailable(format!("Failed to acquire lock: {}", e))
}

#[async_trait]
impl IndexCache for MemoryIndexCache {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn load(&self, video_id: &str) -> Result<Option<VectorIndex>> {
        let indexes = self.indexes.read().map_err(poisoned)?;
        Ok(indexes.get(video_id).cloned())
    }

    async fn save(&self, index: &VectorIndex) -> Result<()> {
        let mut indexes = self.indexes.write().map_err(poisoned)?;
        indexes.insert(index.video_id.clone(), index.clone());
        Ok(())
    }

    async fn remove(&self, video_id: &str) -> Result<bool> {
        let mut indexes = self.indexes.write().map_err(poisoned)?;
        Ok(indexes.remove(video_id).is_some())
    }

    async fn list(&self) -> Result<Vec<CachedIndex>> {
        let indexes = self.indexes.read().map_err(poisoned)?;
        let mut cached: Vec<CachedIndex> = indexes.values().map(CachedIndex::from).collect();
        cached.sort_by(|a, b| a.video_id.cmp(&b.video_id));
        Ok(cached)
    }
}
