//! Streaming chat completions against an OpenAI-compatible API.

use super::{FragmentStream, LanguageModel, Prompt, Role};
use crate::config::ProviderSettings;
use crate::error::{Result, TubeQaError};
use crate::openai::create_client;
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
    CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use futures::StreamExt;
use tracing::{debug, instrument};

/// Chat model served by OpenAI, Ollama or another compatible server.
pub struct OpenAIChatModel {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
}

impl OpenAIChatModel {
    pub fn new(provider: &ProviderSettings, model: &str) -> Result<Self> {
        Ok(Self {
            client: create_client(provider)?,
            model: model.to_string(),
        })
    }

    fn to_messages(prompt: &Prompt) -> Result<Vec<ChatCompletionRequestMessage>> {
        prompt
            .messages
            .iter()
            .map(|m| {
                let message: ChatCompletionRequestMessage = match m.role {
                    Role::System => ChatCompletionRequestSystemMessageArgs::default()
                        .content(m.content.clone())
                        .build()
                        .map_err(|e| TubeQaError::OpenAI(e.to_string()))?
                        .into(),
                    Role::User => ChatCompletionRequestUserMessageArgs::default()
                        .content(m.content.clone())
                        .build()
                        .map_err(|e| TubeQaError::OpenAI(e.to_string()))?
                        .into(),
                    Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                        .content(m.content.clone())
                        .build()
                        .map_err(|e| TubeQaError::OpenAI(e.to_string()))?
                        .into(),
                };
                Ok(message)
            })
            .collect()
    }
}

#[async_trait]
impl LanguageModel for OpenAIChatModel {
    fn model(&self) -> &str {
        &self.model
    }

    #[instrument(skip(self, prompt), fields(model = %self.model, messages = prompt.messages.len()))]
    async fn generate(&self, prompt: &Prompt, temperature: f32) -> Result<FragmentStream> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(Self::to_messages(prompt)?)
            .temperature(temperature)
            .build()
            .map_err(|e| TubeQaError::OpenAI(e.to_string()))?;

        let stream = self
            .client
            .chat()
            .create_stream(request)
            .await
            .map_err(|e| TubeQaError::OpenAI(format!("Failed to start generation: {}", e)))?;

        debug!("Streaming response from {}", self.model);

        let fragments = stream.filter_map(|item| async move {
            match item {
                Ok(response) => response
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|choice| choice.delta.content)
                    .filter(|text| !text.is_empty())
                    .map(Ok),
                Err(e) => Some(Err(TubeQaError::OpenAI(format!("Stream error: {}", e)))),
            }
        });

        Ok(fragments.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_roles_map_to_messages() {
        let mut prompt = Prompt::default();
        prompt.push(Role::System, "rules");
        prompt.push(Role::User, "hi");
        prompt.push(Role::Assistant, "hello");

        let messages = OpenAIChatModel::to_messages(&prompt).unwrap();
        assert_eq!(messages.len(), 3);
        assert!(matches!(messages[0], ChatCompletionRequestMessage::System(_)));
        assert!(matches!(messages[1], ChatCompletionRequestMessage::User(_)));
        assert!(matches!(messages[2], ChatCompletionRequestMessage::Assistant(_)));
    }
}
