//! Cache command implementation.

use crate::cli::{CacheAction, Output};
use crate::config::Settings;
use crate::transcript::normalize_video_id;
use crate::vector_store::create_cache;
use anyhow::Result;

/// Run the cache command.
pub async fn run_cache(action: &CacheAction, settings: Settings) -> Result<()> {
    let cache = create_cache(&settings)?;

    match action {
        CacheAction::List => {
            let indexes = cache.list().await?;
            if indexes.is_empty() {
                Output::info("No indexes cached yet. Use 'tubeqa index <video>' to build one.");
                return Ok(());
            }

            Output::header(&format!("Cached Indexes ({})", indexes.len()));
            println!();
            for index in &indexes {
                Output::index_info(
                    &index.video_id,
                    index.chunk_count,
                    &index.model,
                    &index.built_at.format("%Y-%m-%d %H:%M").to_string(),
                );
            }

            let total_chunks: usize = indexes.iter().map(|i| i.chunk_count).sum();
            println!();
            Output::kv("Backend", cache.name());
            Output::kv("Total chunks", &total_chunks.to_string());
        }

        CacheAction::Remove { video } => {
            let video_id = normalize_video_id(video);
            if cache.remove(&video_id).await? {
                Output::success(&format!("Removed cached index for {}", video_id));
            } else {
                Output::warning(&format!("No cached index for {}", video_id));
            }
        }
    }

    Ok(())
}
