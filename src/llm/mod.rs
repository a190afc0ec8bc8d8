//! Language model boundary.
//!
//! Models deliver answers as a lazy stream of text fragments; callers decide
//! whether to show them incrementally or collect them.

mod openai;

pub use openai::OpenAIChatModel;

use crate::error::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    #[serde(alias = "human")]
    User,
    #[serde(alias = "ai")]
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// One message of a rendered prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: Role,
    pub content: String,
}

/// An ordered list of messages sent to the model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Prompt {
    pub messages: Vec<PromptMessage>,
}

impl Prompt {
    pub fn push(&mut self, role: Role, content: impl Into<String>) {
        self.messages.push(PromptMessage {
            role,
            content: content.into(),
        });
    }
}

/// Stream of answer fragments. An `Err` item ends generation.
pub type FragmentStream = BoxStream<'static, Result<String>>;

/// Trait for text generation backends.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Model name.
    fn model(&self) -> &str;

    /// Start generating a reply to `prompt`.
    async fn generate(&self, prompt: &Prompt, temperature: f32) -> Result<FragmentStream>;
}
