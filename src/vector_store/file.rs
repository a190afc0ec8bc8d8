//! JSON-file index cache.
//!
//! One `<key>.index.json` per video. Writes go to a temporary file in the same
//! directory and are renamed into place, so readers never see a partial index.

use super::{cache_key, CachedIndex, IndexCache, VectorIndex};
use crate::error::{Result, TubeQaError};
use async_trait::async_trait;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, instrument, warn};

const SUFFIX: &str = ".index.json";

/// Index cache storing one JSON file per video.
///
/// File IO and (de)serialization run on tokio's blocking pool.
pub struct FileIndexCache {
    dir: PathBuf,
}

impl FileIndexCache {
    /// The directory is created on the first save.
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn path_for(&self, video_id: &str) -> PathBuf {
        self.dir.join(format!("{}{}", cache_key(video_id), SUFFIX))
    }

    fn read(path: &Path) -> Result<VectorIndex> {
        let file = std::fs::File::open(path)?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }

    fn write(dir: &Path, path: &Path, index: &VectorIndex) -> Result<()> {
        std::fs::create_dir_all(dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            serde_json::to_writer(&mut writer, index)?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;

        tmp.persist(path).map_err(|e| TubeQaError::Io(e.error))?;
        Ok(())
    }

    fn scan(dir: &Path) -> Result<Vec<CachedIndex>> {
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut cached = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let is_index = path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(SUFFIX));
            if !is_index {
                continue;
            }

            match Self::read(&path) {
                Ok(index) => cached.push(CachedIndex::from(&index)),
                Err(e) => warn!("Skipping unreadable index {:?}: {}", path, e),
            }
        }

        cached.sort_by(|a, b| a.video_id.cmp(&b.video_id));
        Ok(cached)
    }
}

/// Run blocking cache work off the async worker threads.
async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| TubeQaError::IndexUnavailable(format!("Cache task failed: {}", e)))?
}

#[async_trait]
impl IndexCache for FileIndexCache {
    fn name(&self) -> &'static str {
        "file"
    }

    #[instrument(skip(self))]
    async fn load(&self, video_id: &str) -> Result<Option<VectorIndex>> {
        let path = self.path_for(video_id);
        blocking(move || {
            if !path.exists() {
                return Ok(None);
            }
            debug!("Reading index from {:?}", path);
            Self::read(&path).map(Some)
        })
        .await
    }

    #[instrument(skip(self, index), fields(video_id = %index.video_id))]
    async fn save(&self, index: &VectorIndex) -> Result<()> {
        let dir = self.dir.clone();
        let path = self.path_for(&index.video_id);
        let index = index.clone();

        blocking(move || {
            Self::write(&dir, &path, &index)?;
            debug!("Wrote index to {:?}", path);
            Ok(())
        })
        .await
    }

    async fn remove(&self, video_id: &str) -> Result<bool> {
        let path = self.path_for(video_id);
        blocking(move || match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        })
        .await
    }

    async fn list(&self) -> Result<Vec<CachedIndex>> {
        let dir = self.dir.clone();
        blocking(move || Self::scan(&dir)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::Chunk;
    use crate::vector_store::IndexEntry;

    fn sample_index(video_id: &str, texts: &[&str]) -> VectorIndex {
        let entries = texts
            .iter()
            .enumerate()
            .map(|(i, t)| IndexEntry {
                chunk: Chunk::new(t.to_string(), i as f64 * 10.0, i),
                embedding: vec![i as f32, 1.0],
            })
            .collect();
        VectorIndex::new(video_id, "test-model", entries)
    }

    #[tokio::test]
    async fn test_save_load_creates_dir() {
        let root = tempfile::tempdir().unwrap();
        let cache = FileIndexCache::new(root.path().join("cache"));

        assert!(cache.load("vid").await.unwrap().is_none());

        cache.save(&sample_index("vid", &["a", "b"])).await.unwrap();
        let loaded = cache.load("vid").await.unwrap().unwrap();

        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.entries[1].chunk.start, Some(10.0));
        assert_eq!(loaded.model, "test-model");
    }

    #[tokio::test]
    async fn test_save_replaces_and_leaves_no_temp_files() {
        let root = tempfile::tempdir().unwrap();
        let cache = FileIndexCache::new(root.path().to_path_buf());

        cache.save(&sample_index("vid", &["a"])).await.unwrap();
        cache.save(&sample_index("vid", &["a", "b", "c"])).await.unwrap();

        assert_eq!(cache.load("vid").await.unwrap().unwrap().len(), 3);
        let files: Vec<_> = std::fs::read_dir(root.path()).unwrap().collect();
        assert_eq!(files.len(), 1);
    }

    #[tokio::test]
    async fn test_list_and_remove() {
        let root = tempfile::tempdir().unwrap();
        let cache = FileIndexCache::new(root.path().to_path_buf());

        cache.save(&sample_index("b/vid", &["x"])).await.unwrap();
        cache.save(&sample_index("a-vid", &["x", "y"])).await.unwrap();
        std::fs::write(root.path().join("notes.txt"), "ignored").unwrap();

        let listed = cache.list().await.unwrap();
        let ids: Vec<_> = listed.iter().map(|c| c.video_id.as_str()).collect();
        assert_eq!(ids, vec!["a-vid", "b/vid"]);
        assert_eq!(listed[0].chunk_count, 2);

        assert!(cache.remove("b/vid").await.unwrap());
        assert!(!cache.remove("b/vid").await.unwrap());
        assert_eq!(cache.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_json_error() {
        let root = tempfile::tempdir().unwrap();
        let cache = FileIndexCache::new(root.path().to_path_buf());
        std::fs::write(root.path().join("vid.index.json"), "[1, 2").unwrap();

        let err = cache.load("vid").await.unwrap_err();
        assert!(matches!(err, TubeQaError::Json(_)));
    }
}
