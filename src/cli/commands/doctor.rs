//! Doctor command - verify system requirements and configuration.

use crate::cli::Output;
use crate::config::{IndexBackend, Settings, TranscriptSourceKind};
use console::style;
use std::process::Command;

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

/// Run all diagnostic checks.
pub fn run_doctor(settings: &Settings) -> anyhow::Result<()> {
    Output::header("tubeqa Doctor");
    println!();
    println!("Checking system requirements and configuration...\n");

    let sections = [
        ("Transcript Source", vec![check_transcript_source(settings)]),
        ("Model Provider", vec![check_provider(settings)]),
        ("Directories", vec![check_data_dir(settings), check_cache(settings)]),
        ("Configuration", vec![check_config_file()]),
    ];

    let mut checks = Vec::new();
    for (title, results) in sections {
        println!("{}", style(title).bold());
        for check in &results {
            check.print();
        }
        println!();
        checks.extend(results);
    }

    let errors = checks.iter().filter(|c| c.status == CheckStatus::Error).count();
    let warnings = checks.iter().filter(|c| c.status == CheckStatus::Warning).count();

    if errors > 0 {
        Output::error(&format!(
            "{} error(s) found. Please fix them before using tubeqa.",
            errors
        ));
        std::process::exit(1);
    } else if warnings > 0 {
        Output::warning(&format!("All checks passed with {} warning(s).", warnings));
    } else {
        Output::success("All checks passed! tubeqa is ready to use.");
    }

    Ok(())
}

fn check_transcript_source(settings: &Settings) -> CheckResult {
    match settings.transcript.source {
        TranscriptSourceKind::Youtube => check_tool("yt-dlp", install_hint_ytdlp()),
        TranscriptSourceKind::File => {
            let dir = settings.transcripts_dir();
            if dir.is_dir() {
                CheckResult::ok("Transcripts directory", &dir.display().to_string())
            } else {
                CheckResult::error(
                    "Transcripts directory",
                    &format!("{} not found", dir.display()),
                    "Create it and add <video_id>.json transcript files",
                )
            }
        }
    }
}

/// Check if an external tool is available.
fn check_tool(name: &str, hint: &str) -> CheckResult {
    match Command::new(name).arg("--version").output() {
        Ok(output) if output.status.success() => {
            let version = String::from_utf8_lossy(&output.stdout)
                .lines()
                .next()
                .unwrap_or("installed")
                .trim()
                .to_string();

            let version_display = if version.chars().count() > 50 {
                format!("{}...", version.chars().take(50).collect::<String>())
            } else {
                version
            };

            CheckResult::ok(name, &version_display)
        }
        Ok(_) => CheckResult::error(name, "installed but not working", hint),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            CheckResult::error(name, "not found", hint)
        }
        Err(e) => CheckResult::error(name, &format!("error: {}", e), hint),
    }
}

/// Hosted OpenAI needs an API key; a local endpoint does not.
fn check_provider(settings: &Settings) -> CheckResult {
    if let Some(base) = settings.provider.api_base.as_deref() {
        if !settings.provider.uses_hosted_openai() {
            return CheckResult::ok("API base", base);
        }
    }
    check_openai_api_key(std::env::var("OPENAI_API_KEY").ok().as_deref())
}

fn check_openai_api_key(key: Option<&str>) -> CheckResult {
    match key {
        Some(key) if key.starts_with("sk-") && key.len() > 20 => {
            let masked = format!("{}...{}", &key[..7], &key[key.len() - 4..]);
            CheckResult::ok("OPENAI_API_KEY", &format!("configured ({})", masked))
        }
        Some("") => CheckResult::error(
            "OPENAI_API_KEY",
            "empty",
            "Set with: export OPENAI_API_KEY='sk-...'",
        ),
        Some(_) => CheckResult::warning(
            "OPENAI_API_KEY",
            "set but format looks unusual",
            "Expected format: sk-... (OpenAI API key)",
        ),
        None => CheckResult::error(
            "OPENAI_API_KEY",
            "not set",
            "Set with: export OPENAI_API_KEY='sk-...' or set provider.api_base to a local server",
        ),
    }
}

fn check_data_dir(settings: &Settings) -> CheckResult {
    let data_dir = settings.data_dir();
    if data_dir.exists() {
        CheckResult::ok("Data directory", &format!("{}", data_dir.display()))
    } else {
        CheckResult::warning(
            "Data directory",
            &format!("{} (will be created)", data_dir.display()),
            "Directory will be created on first use",
        )
    }
}

fn check_cache(settings: &Settings) -> CheckResult {
    let dir = settings.cache_dir();
    let label = format!("{} backend", settings.index.backend);

    if !dir.exists() {
        return CheckResult::warning(
            &label,
            &format!("{} (not created yet)", dir.display()),
            "The cache is created when the first video is indexed",
        );
    }

    let size = match settings.index.backend {
        IndexBackend::Sqlite => std::fs::metadata(dir.join("indexes.db"))
            .map(|m| m.len())
            .unwrap_or(0),
        IndexBackend::File => std::fs::read_dir(&dir)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .filter_map(|e| e.metadata().ok())
                    .map(|m| m.len())
                    .sum()
            })
            .unwrap_or(0),
    };

    CheckResult::ok(&label, &format!("{} ({})", dir.display(), format_size(size)))
}

/// Check if config file exists.
fn check_config_file() -> CheckResult {
    let config_path = Settings::default_config_path();
    if config_path.exists() {
        CheckResult::ok("Config file", &format!("{}", config_path.display()))
    } else {
        CheckResult::warning(
            "Config file",
            "using defaults",
            "Create with: tubeqa config init",
        )
    }
}

/// Format file size in human-readable format.
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Platform-specific install hint for yt-dlp.
fn install_hint_ytdlp() -> &'static str {
    if cfg!(target_os = "macos") {
        "Install with: brew install yt-dlp"
    } else if cfg!(target_os = "linux") {
        "Install with: pip install yt-dlp (or your package manager)"
    } else {
        "Install from: https://github.com/yt-dlp/yt-dlp"
    }
}
