//! CLI command implementations.

mod ask;
mod cache;
mod chat;
mod config;
mod doctor;
mod index;
mod serve;

pub use ask::run_ask;
pub use cache::run_cache;
pub use chat::run_chat;
pub use config::run_config;
pub use doctor::run_doctor;
pub use index::run_index;
pub use serve::{router, run_serve, AppState};
