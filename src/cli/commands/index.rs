//! Index command: build the cached index for a video ahead of questions.

use crate::cli::preflight;
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Pipeline;
use crate::transcript::normalize_video_id;
use anyhow::Result;

pub async fn run_index(video: &str, force: bool, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(&settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'tubeqa doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let pipeline = Pipeline::new(&settings)?;
    let video_id = normalize_video_id(video);

    let spinner = Output::spinner(&format!("Indexing {}...", video_id));
    let result = pipeline.prepare_index(&video_id, force).await;
    spinner.finish_and_clear();

    match result {
        Ok(Some(index)) => {
            Output::success(&format!(
                "Indexed {} ({} chunks, {})",
                video_id,
                index.len(),
                index.model
            ));
        }
        Ok(None) => {
            Output::warning(&format!("No transcript available for {}", video_id));
        }
        Err(e) => {
            Output::error(&format!("Failed to index {}: {}", video_id, e));
            return Err(e.into());
        }
    }

    Ok(())
}
