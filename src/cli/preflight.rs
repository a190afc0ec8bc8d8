//! Pre-flight checks before expensive operations.
//!
//! Validates that required tools and configuration are available
//! before starting operations that would otherwise fail midway.

use crate::config::{Settings, TranscriptSourceKind};
use crate::error::{Result, TubeQaError};
use std::process::Command;

/// Run pre-flight checks for answering questions with the given settings.
///
/// Returns Ok(()) if all checks pass, or an error describing what's missing.
pub fn check(settings: &Settings) -> Result<()> {
    if settings.provider.uses_hosted_openai() {
        check_api_key()?;
    }
    if settings.transcript.source == TranscriptSourceKind::Youtube {
        check_tool("yt-dlp")?;
    }
    Ok(())
}

/// Check if OpenAI API key is configured.
pub fn check_api_key() -> Result<()> {
    match std::env::var("OPENAI_API_KEY") {
        Ok(key) if !key.is_empty() => Ok(()),
        Ok(_) => Err(TubeQaError::Config(
            "OPENAI_API_KEY is empty. Set it with: export OPENAI_API_KEY='sk-...'".to_string(),
        )),
        Err(_) => Err(TubeQaError::Config(
            "OPENAI_API_KEY not set. Set it with: export OPENAI_API_KEY='sk-...' \
             or point provider.api_base at a local server"
                .to_string(),
        )),
    }
}

/// Check if an external tool is available.
pub fn check_tool(name: &str) -> Result<()> {
    match Command::new(name).arg("--version").output() {
        Ok(output) if output.status.success() => Ok(()),
        Ok(_) => Err(TubeQaError::ToolNotFound(format!(
            "{} is installed but not working correctly",
            name
        ))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(TubeQaError::ToolNotFound(name.to_string()))
        }
        Err(e) => Err(TubeQaError::ToolNotFound(format!("{}: {}", name, e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_provider_with_files_needs_nothing() {
        let mut settings = Settings::default();
        settings.provider.api_base = Some("http://localhost:11434/v1".to_string());
        settings.transcript.source = TranscriptSourceKind::File;
        assert!(check(&settings).is_ok());
    }

    #[test]
    fn test_missing_tool() {
        let err = check_tool("tubeqa-definitely-not-a-real-tool").unwrap_err();
        assert!(matches!(err, TubeQaError::ToolNotFound(_)));
    }
}
