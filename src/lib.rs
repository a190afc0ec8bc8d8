//! tubeqa - Ask questions about a video, answered from its transcript
//!
//! Answers are grounded only in the video's spoken transcript and come back
//! with the timestamps of the passages that support them.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Configuration management
//! - `transcript` - Transcript acquisition (YouTube captions, local files)
//! - `chunking` - Overlapping transcript windows
//! - `embedding` - Embedding generation
//! - `vector_store` - Per-video vector indexes and their cache
//! - `llm` - Streaming language model boundary
//! - `rag` - Retrieval and grounded answer synthesis
//! - `orchestrator` - Pipeline coordination
//!
//! # Example
//!
//! ```rust,no_run
//! use tubeqa::config::Settings;
//! use tubeqa::orchestrator::Pipeline;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let pipeline = Pipeline::new(&settings)?;
//!
//!     let result = pipeline.run("dQw4w9WgXcQ", "What is the song about?", &[]).await?;
//!     println!("{}", result.answer);
//!     for ts in &result.timestamps {
//!         println!("{} {}", ts.label(), ts.text);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod chunking;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod llm;
pub mod openai;
pub mod orchestrator;
pub mod rag;
pub mod transcript;
pub mod vector_store;

#[cfg(test)]
mod testing;

pub use error::{Result, TubeQaError};
