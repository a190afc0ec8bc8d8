//! Transcripts stored as JSON files on disk.

use super::{sort_entries, TranscriptEntry, TranscriptSource};
use crate::error::{Result, TubeQaError};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;

/// Reads `<dir>/<video_id>.json`, a JSON array of `{text, start, duration}`.
pub struct FileTranscriptSource {
    dir: PathBuf,
}

impl FileTranscriptSource {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn path_for(&self, video_id: &str) -> Result<PathBuf> {
        let valid = !video_id.is_empty()
            && video_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(TubeQaError::InvalidInput(format!(
                "Invalid video ID for file transcripts: {}",
                video_id
            )));
        }
        Ok(self.dir.join(format!("{}.json", video_id)))
    }
}

#[async_trait]
impl TranscriptSource for FileTranscriptSource {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn fetch(&self, video_id: &str) -> Result<Vec<TranscriptEntry>> {
        let path = self.path_for(video_id)?;
        if !path.exists() {
            return Err(TubeQaError::TranscriptUnavailable(format!(
                "No transcript file at {}",
                path.display()
            )));
        }

        let content = tokio::fs::read_to_string(&path).await?;
        let mut entries: Vec<TranscriptEntry> = serde_json::from_str(&content)?;
        sort_entries(&mut entries);

        debug!("Loaded {} transcript entries from {:?}", entries.len(), path);
        Ok(entries)
    }
}
