//! Transcript acquisition.
//!
//! A [`TranscriptSource`] turns a video id into its timestamped caption lines.
//! An empty result means the video has no usable transcript.

mod file;
mod youtube;

pub use file::FileTranscriptSource;
pub use youtube::{extract_video_id, YoutubeTranscriptSource};

use crate::config::{Settings, TranscriptSourceKind};
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One caption line of a video transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    /// Spoken text.
    pub text: String,
    /// Offset from the start of the video, in seconds.
    pub start: f64,
    /// How long the line is shown, in seconds.
    #[serde(default)]
    pub duration: f64,
}

impl TranscriptEntry {
    pub fn new(text: impl Into<String>, start: f64, duration: f64) -> Self {
        Self {
            text: text.into(),
            start,
            duration,
        }
    }
}

/// Trait for transcript providers.
#[async_trait]
pub trait TranscriptSource: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Fetch the transcript for a video, ordered by `start` ascending.
    async fn fetch(&self, video_id: &str) -> Result<Vec<TranscriptEntry>>;
}

/// Sort entries by start time, keeping the original order on ties.
pub(crate) fn sort_entries(entries: &mut [TranscriptEntry]) {
    entries.sort_by(|a, b| a.start.total_cmp(&b.start));
}

/// Canonical id for a video: the YouTube id if `input` is a YouTube URL or
/// id, otherwise the trimmed input.
pub fn normalize_video_id(input: &str) -> String {
    extract_video_id(input).unwrap_or_else(|| input.trim().to_string())
}

/// Create the transcript source selected in the settings.
pub fn create_source(settings: &Settings) -> Arc<dyn TranscriptSource> {
    match settings.transcript.source {
        TranscriptSourceKind::Youtube => Arc::new(YoutubeTranscriptSource::with_languages(
            settings.transcript.languages.clone(),
        )),
        TranscriptSourceKind::File => {
            Arc::new(FileTranscriptSource::new(settings.transcripts_dir()))
        }
    }
}
