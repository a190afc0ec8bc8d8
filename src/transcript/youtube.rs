//! YouTube captions via yt-dlp.

use super::{sort_entries, TranscriptEntry, TranscriptSource};
use crate::error::{Result, TubeQaError};
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::{debug, info, instrument};

static VIDEO_ID_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    // Matches various YouTube URL formats and bare video IDs
    Regex::new(
        r"(?x)
        (?:
            # Full YouTube URLs
            (?:https?://)?
            (?:www\.|m\.)?
            (?:youtube\.com/watch\?(?:.*&)?v=|youtu\.be/|youtube\.com/embed/|youtube\.com/v/|youtube\.com/shorts/)
            ([a-zA-Z0-9_-]{11})
        )
        |
        # Bare video ID (11 characters)
        ^([a-zA-Z0-9_-]{11})$
    ",
    )
    .expect("video id regex is valid")
});

/// Extract a video ID from a YouTube URL or bare ID.
pub fn extract_video_id(input: &str) -> Option<String> {
    let caps = VIDEO_ID_REGEX.captures(input.trim())?;

    // Try group 1 (URL format) then group 2 (bare ID)
    caps.get(1)
        .or_else(|| caps.get(2))
        .map(|m| m.as_str().to_string())
}

/// Fetches manual or auto-generated captions with yt-dlp in json3 format.
pub struct YoutubeTranscriptSource {
    languages: Vec<String>,
}

impl YoutubeTranscriptSource {
    pub fn with_languages(languages: Vec<String>) -> Self {
        let languages = if languages.is_empty() {
            vec!["en".to_string()]
        } else {
            languages
        };
        Self { languages }
    }

    /// Run yt-dlp and return the caption files it wrote.
    async fn download_captions(&self, video_id: &str, out_dir: &Path) -> Result<Vec<PathBuf>> {
        let url = format!("https://www.youtube.com/watch?v={}", video_id);
        let template = out_dir.join("%(id)s.%(ext)s");
        let langs = self.languages.join(",");

        let output = tokio::process::Command::new("yt-dlp")
            .arg("--skip-download")
            .arg("--write-subs")
            .arg("--write-auto-subs")
            .args(["--sub-langs", &langs])
            .args(["--sub-format", "json3"])
            .arg("--no-warnings")
            .arg("-o")
            .arg(&template)
            .arg(&url)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    TubeQaError::ToolNotFound("yt-dlp".to_string())
                } else {
                    TubeQaError::TranscriptUnavailable(format!("Failed to run yt-dlp: {}", e))
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TubeQaError::TranscriptUnavailable(format!(
                "yt-dlp failed for {}: {}",
                video_id,
                stderr.trim()
            )));
        }

        let mut files = Vec::new();
        for entry in std::fs::read_dir(out_dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json3") {
                files.push(path);
            }
        }
        Ok(files)
    }

    /// Pick the caption file for the most preferred language available.
    fn pick_file(&self, files: &[PathBuf]) -> Option<PathBuf> {
        self.languages
            .iter()
            .find_map(|lang| {
                let suffix = format!(".{}.json3", lang);
                files
                    .iter()
                    .find(|f| f.to_string_lossy().ends_with(&suffix))
                    .cloned()
            })
            .or_else(|| files.first().cloned())
    }
}

#[derive(Debug, Deserialize)]
struct Json3 {
    #[serde(default)]
    events: Vec<Json3Event>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Json3Event {
    t_start_ms: Option<u64>,
    d_duration_ms: Option<u64>,
    #[serde(default)]
    segs: Vec<Json3Segment>,
}

#[derive(Debug, Deserialize)]
struct Json3Segment {
    #[serde(default)]
    utf8: String,
}

/// Parse a yt-dlp json3 caption document into transcript entries.
pub(crate) fn parse_json3(content: &str) -> Result<Vec<TranscriptEntry>> {
    let doc: Json3 = serde_json::from_str(content)?;

    let mut entries: Vec<TranscriptEntry> = doc
        .events
        .into_iter()
        .filter_map(|event| {
            let start_ms = event.t_start_ms?;
            let raw: String = event.segs.iter().map(|s| s.utf8.as_str()).collect();
            let text = raw.split_whitespace().collect::<Vec<_>>().join(" ");
            if text.is_empty() {
                return None;
            }
            Some(TranscriptEntry {
                text,
                start: start_ms as f64 / 1000.0,
                duration: event.d_duration_ms.unwrap_or(0) as f64 / 1000.0,
            })
        })
        .collect();

    sort_entries(&mut entries);
    Ok(entries)
}

#[async_trait]
impl TranscriptSource for YoutubeTranscriptSource {
    fn name(&self) -> &'static str {
        "youtube"
    }

    #[instrument(skip(self))]
    async fn fetch(&self, video_id: &str) -> Result<Vec<TranscriptEntry>> {
        let video_id = extract_video_id(video_id).ok_or_else(|| {
            TubeQaError::InvalidInput(format!("Invalid YouTube video ID or URL: {}", video_id))
        })?;

        let work_dir = tempfile::tempdir()?;
        let files = self.download_captions(&video_id, work_dir.path()).await?;
        debug!("yt-dlp wrote {} caption files", files.len());

        let Some(path) = self.pick_file(&files) else {
            return Err(TubeQaError::TranscriptUnavailable(format!(
                "No {} captions for {}",
                self.languages.join("/"),
                video_id
            )));
        };

        let content = tokio::fs::read_to_string(&path).await?;
        let entries = parse_json3(&content)?;
        info!("Fetched {} caption lines for {}", entries.len(), video_id);
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_video_id() {
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );
        assert_eq!(
            extract_video_id("https://youtu.be/dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );
        assert_eq!(
            extract_video_id("https://www.youtube.com/watch?list=PL1&v=dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );
        assert_eq!(extract_video_id("dQw4w9WgXcQ"), Some("dQw4w9WgXcQ".to_string()));

        assert_eq!(extract_video_id("not-a-video-id"), None);
        assert_eq!(extract_video_id(""), None);
    }

    #[test]
    fn test_parse_json3() {
        let content = r#"{
            "events": [
                {"tStartMs": 0, "dDurationMs": 5000},
                {"tStartMs": 2500, "dDurationMs": 1500, "segs": [{"utf8": "and then"}, {"utf8": "\nmore"}]},
                {"tStartMs": 1000, "dDurationMs": 2000, "segs": [{"utf8": "Hello "}, {"utf8": "world"}]},
                {"tStartMs": 4000, "segs": [{"utf8": "\n"}]}
            ]
        }"#;

        let entries = parse_json3(content).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].text, "Hello world");
        assert_eq!(entries[0].start, 1.0);
        assert_eq!(entries[0].duration, 2.0);
        assert_eq!(entries[1].text, "and then more");
        assert_eq!(entries[1].start, 2.5);
    }

    #[test]
    fn test_pick_file_prefers_language_order() {
        let source = YoutubeTranscriptSource::with_languages(vec!["de".into(), "en".into()]);
        let files = vec![
            PathBuf::from("/tmp/x/abc.en.json3"),
            PathBuf::from("/tmp/x/abc.de.json3"),
        ];
        assert_eq!(source.pick_file(&files), Some(PathBuf::from("/tmp/x/abc.de.json3")));
        assert_eq!(source.pick_file(&[]), None);
    }
}
