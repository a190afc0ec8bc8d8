//! Ask command implementation.

use crate::cli::preflight;
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Pipeline;
use crate::transcript::normalize_video_id;
use anyhow::Result;

/// Run the ask command.
pub async fn run_ask(video: &str, question: &str, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(&settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'tubeqa doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let pipeline = Pipeline::new(&settings)?;
    let video_id = normalize_video_id(video);

    let spinner = Output::spinner("Reading transcript...");

    match pipeline.run(&video_id, question, &[]).await {
        Ok(result) => {
            spinner.finish_and_clear();

            println!("\n{}\n", result.answer);

            if !result.timestamps.is_empty() {
                Output::header("Timestamps");
                for ts in &result.timestamps {
                    Output::timestamp(ts, &video_id);
                }
                println!();
            }
        }
        Err(e) => {
            spinner.finish_and_clear();
            Output::error(&format!("Failed to answer: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
