//! CLI output formatting utilities.

use crate::rag::Timestamp;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// Output helper for CLI formatting.
pub struct Output;

impl Output {
    /// Print an info message.
    pub fn info(msg: &str) {
        println!("{} {}", style(">>").cyan().bold(), msg);
    }

    /// Print a success message.
    pub fn success(msg: &str) {
        println!("{} {}", style(">>").green().bold(), msg);
    }

    /// Print a warning message.
    pub fn warning(msg: &str) {
        eprintln!("{} {}", style(">>").yellow().bold(), msg);
    }

    /// Print an error message.
    pub fn error(msg: &str) {
        eprintln!("{} {}", style(">>").red().bold(), msg);
    }

    /// Print a header.
    pub fn header(msg: &str) {
        println!("\n{}", style(msg).bold().underlined());
    }

    /// Print a key-value pair.
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", style(key).dim(), value);
    }

    /// Print a cached index line.
    pub fn index_info(video_id: &str, chunks: usize, model: &str, built_at: &str) {
        println!(
            "  {} {} ({} chunks, {}, built {})",
            style("*").cyan(),
            style(video_id).bold(),
            chunks,
            style(model).dim(),
            built_at
        );
    }

    /// Print a supporting timestamp.
    pub fn timestamp(ts: &Timestamp, video_id: &str) {
        println!(
            "\n{} {} {}",
            style(">>").green(),
            style(ts.label()).cyan().bold(),
            content_preview(&ts.text, 200)
        );
        println!("   {}", style(ts.youtube_url(video_id)).dim());
    }

    /// Create a spinner.
    pub fn spinner(msg: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        if let Ok(template) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            pb.set_style(template);
        }
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }
}

/// Truncate content with ellipsis.
fn content_preview(content: &str, max_chars: usize) -> String {
    let content = content.replace('\n', " ");
    if content.chars().count() <= max_chars {
        content
    } else {
        let cut: String = content.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_preview() {
        assert_eq!(content_preview("short\ntext", 20), "short text");
        assert_eq!(content_preview("abcdef", 3), "abc...");
        assert_eq!(content_preview("ééééé", 2), "éé...");
    }
}
