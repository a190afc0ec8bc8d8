//! CLI module for tubeqa.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use clap::{Parser, Subcommand};

/// tubeqa - Ask questions about a video, answered from its transcript
///
/// Answers cite the moments in the video that support them.
#[derive(Parser, Debug)]
#[command(name = "tubeqa")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true, env = "TUBEQA_CONFIG")]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ask a single question about a video
    Ask {
        /// YouTube URL or video ID
        video: String,

        /// The question to ask
        question: String,
    },

    /// Start an interactive chat about a video
    Chat {
        /// YouTube URL or video ID
        video: String,
    },

    /// Fetch, chunk and index a video ahead of time
    Index {
        /// YouTube URL or video ID
        video: String,

        /// Rebuild even if an index is already cached
        #[arg(short, long)]
        force: bool,
    },

    /// Inspect or prune the index cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Start the HTTP API server
    Serve {
        /// Host to bind to (defaults to server.host)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to (defaults to server.port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Check system requirements and configuration
    Doctor,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// List cached indexes
    List,

    /// Remove the cached index for a video
    Remove {
        /// YouTube URL or video ID
        video: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Write the current configuration to the config file
    Init,

    /// Show configuration file path
    Path,
}
