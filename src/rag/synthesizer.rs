//! Grounded answer generation.

use super::{ChatTurn, RagResult, Timestamp, NO_ANSWER};
use crate::chunking::Chunk;
use crate::config::Prompts;
use crate::error::{Result, TubeQaError};
use crate::llm::{LanguageModel, Prompt, Role};
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Default sampling temperature, low to keep answers close to the context.
pub const DEFAULT_TEMPERATURE: f32 = 0.2;

/// Default number of characters in a timestamp preview.
pub const DEFAULT_PREVIEW_CHARS: usize = 120;

/// Builds a context-restricted prompt, runs the model and attaches timestamps.
pub struct AnswerSynthesizer {
    llm: Arc<dyn LanguageModel>,
    prompts: Prompts,
    temperature: f32,
    preview_chars: usize,
}

impl AnswerSynthesizer {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self {
            llm,
            prompts: Prompts::default(),
            temperature: DEFAULT_TEMPERATURE,
            preview_chars: DEFAULT_PREVIEW_CHARS,
        }
    }

    /// Set custom prompts (with user-defined variables).
    pub fn with_prompts(mut self, prompts: Prompts) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_preview_chars(mut self, preview_chars: usize) -> Self {
        self.preview_chars = preview_chars;
        self
    }

    /// Answer `question` from `passages` (in retrieval order).
    pub async fn synthesize(
        &self,
        passages: &[Chunk],
        question: &str,
        chat_history: &[ChatTurn],
    ) -> Result<RagResult> {
        self.synthesize_with(passages, question, chat_history, |_| {}).await
    }

    /// Like [`synthesize`](Self::synthesize), calling `on_fragment` for each
    /// streamed piece of the answer as it arrives.
    #[instrument(skip_all, fields(passages = passages.len(), history = chat_history.len()))]
    pub async fn synthesize_with<F>(
        &self,
        passages: &[Chunk],
        question: &str,
        chat_history: &[ChatTurn],
        mut on_fragment: F,
    ) -> Result<RagResult>
    where
        F: FnMut(&str) + Send,
    {
        if passages.is_empty() {
            return Ok(RagResult::fallback(NO_ANSWER));
        }

        let timestamps = build_timestamps(passages, self.preview_chars);
        let prompt = self.render_prompt(&context_text(passages), question, chat_history);

        info!("Generating answer with {}", self.llm.model());

        let mut stream = self
            .llm
            .generate(&prompt, self.temperature)
            .await
            .map_err(|e| TubeQaError::GenerationFailed {
                message: e.to_string(),
                partial: String::new(),
            })?;

        let mut answer = String::new();
        while let Some(fragment) = stream.next().await {
            match fragment {
                Ok(text) => {
                    on_fragment(&text);
                    answer.push_str(&text);
                }
                Err(e) => {
                    return Err(TubeQaError::GenerationFailed {
                        message: e.to_string(),
                        partial: answer,
                    });
                }
            }
        }

        debug!("Generated {} chars with {} timestamps", answer.len(), timestamps.len());

        Ok(RagResult { answer, timestamps })
    }

    /// System instruction with the context, then the history, then the question.
    pub fn render_prompt(&self, context: &str, question: &str, chat_history: &[ChatTurn]) -> Prompt {
        let mut vars = HashMap::new();
        vars.insert("context".to_string(), context.to_string());

        let mut prompt = Prompt::default();
        prompt.push(
            Role::System,
            self.prompts.render_with_custom(&self.prompts.rag.system, &vars),
        );
        for turn in chat_history {
            prompt.push(turn.role, turn.content.clone());
        }
        prompt.push(Role::User, question);
        prompt
    }
}

/// Passage texts in retrieval order, separated by blank lines.
pub fn context_text(passages: &[Chunk]) -> String {
    passages
        .iter()
        .map(|p| p.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// One timestamp per passage with a defined start, ascending by start.
///
/// Equal starts keep chunk construction order.
pub fn build_timestamps(passages: &[Chunk], preview_chars: usize) -> Vec<Timestamp> {
    let mut dated: Vec<(f64, usize, &Chunk)> = passages
        .iter()
        .filter_map(|p| p.start_seconds().map(|start| (start, p.order, p)))
        .collect();

    dated.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));

    dated
        .into_iter()
        .map(|(start, _, chunk)| Timestamp {
            start,
            text: preview(&chunk.text, preview_chars),
        })
        .collect()
}

fn preview(text: &str, max_chars: usize) -> String {
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedModel;

    fn chunk(text: &str, start: f64, order: usize) -> Chunk {
        Chunk::new(text.to_string(), start, order)
    }

    #[tokio::test]
    async fn test_empty_passages_skip_model() {
        let model = Arc::new(ScriptedModel::new(&["should not be used"]));
        let synthesizer = AnswerSynthesizer::new(model.clone());

        let history = vec![ChatTurn::user("earlier"), ChatTurn::assistant("reply")];
        let result = synthesizer.synthesize(&[], "anything?", &history).await.unwrap();

        assert_eq!(result, RagResult::fallback("I don't know."));
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_fragments_are_concatenated_in_order() {
        let model = Arc::new(ScriptedModel::new(&["The ", "talk covers ", "embeddings."]));
        let synthesizer = AnswerSynthesizer::new(model.clone());

        let mut seen = Vec::new();
        let result = synthesizer
            .synthesize_with(&[chunk("about embeddings", 4.0, 0)], "What?", &[], |f| {
                seen.push(f.to_string())
            })
            .await
            .unwrap();

        assert_eq!(result.answer, "The talk covers embeddings.");
        assert_eq!(seen.len(), 3);
        assert_eq!(model.calls(), 1);
        assert!((model.last_temperature() - 0.2).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_timestamps_sorted_independent_of_rank() {
        let model = Arc::new(ScriptedModel::new(&["ok"]));
        let passages = vec![chunk("later passage", 12.5, 4), chunk("earlier passage", 3.0, 1)];

        let result = AnswerSynthesizer::new(model)
            .synthesize(&passages, "q", &[])
            .await
            .unwrap();

        let starts: Vec<f64> = result.timestamps.iter().map(|t| t.start).collect();
        assert_eq!(starts, vec![3.0, 12.5]);
        assert_eq!(result.timestamps[0].text, "earlier passage...");
    }

    #[tokio::test]
    async fn test_mid_stream_failure_keeps_partial() {
        let model = Arc::new(ScriptedModel::failing_after(&["Partial ", "answer"]));
        let err = AnswerSynthesizer::new(model)
            .synthesize(&[chunk("ctx", 0.0, 0)], "q", &[])
            .await
            .unwrap_err();

        match err {
            TubeQaError::GenerationFailed { partial, .. } => assert_eq!(partial, "Partial answer"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_prompt_layout() {
        let model = Arc::new(ScriptedModel::new(&["fine"]));
        let synthesizer = AnswerSynthesizer::new(model.clone());
        let passages = vec![chunk("first text", 9.0, 2), chunk("second text", 1.0, 0)];
        let history = vec![ChatTurn::user("who spoke?"), ChatTurn::assistant("Alice.")];

        synthesizer.synthesize(&passages, "and then?", &history).await.unwrap();

        let prompt = model.last_prompt().unwrap();
        let roles: Vec<Role> = prompt.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant, Role::User]);
        assert!(prompt.messages[0]
            .content
            .contains("Transcript context:\nfirst text\n\nsecond text"));
        assert!(prompt.messages[0].content.contains("ONLY use the following transcript context"));
        assert_eq!(prompt.messages[3].content, "and then?");
    }

    #[tokio::test]
    async fn test_transcript_text_is_not_rendered_as_template() {
        let model = Arc::new(ScriptedModel::new(&["fine"]));
        let mut prompts = Prompts::default();
        prompts.rag.system = "Tone: {{tone}}\n{{context}}".to_string();
        prompts.variables.insert("tone".to_string(), "formal".to_string());

        AnswerSynthesizer::new(model.clone())
            .with_prompts(prompts)
            .synthesize(&[chunk("speaker says {{tone}} literally", 0.0, 0)], "q", &[])
            .await
            .unwrap();

        let prompt = model.last_prompt().unwrap();
        assert_eq!(
            prompt.messages[0].content,
            "Tone: formal\nspeaker says {{tone}} literally"
        );
    }

    #[test]
    fn test_passages_without_start_are_dropped() {
        let mut undated = chunk("no time", 0.0, 0);
        undated.start = None;
        let passages = vec![undated, chunk("timed", 5.0, 1), chunk("bad", f64::NAN, 2)];

        let timestamps = build_timestamps(&passages, 120);
        assert_eq!(timestamps.len(), 1);
        assert_eq!(timestamps[0].start, 5.0);

        assert_eq!(context_text(&passages), "no time\n\ntimed\n\nbad");
    }

    #[test]
    fn test_equal_starts_break_ties_by_chunk_order() {
        let passages = vec![chunk("b", 7.0, 3), chunk("a", 7.0, 1), chunk("c", 2.0, 5)];
        let texts: Vec<String> = build_timestamps(&passages, 10)
            .into_iter()
            .map(|t| t.text)
            .collect();
        assert_eq!(texts, vec!["c...", "a...", "b..."]);
    }

    #[test]
    fn test_preview_truncates_on_chars() {
        let text = "é".repeat(130);
        let p = preview(&text, 120);
        assert_eq!(p.chars().count(), 123);
        assert!(p.ends_with("..."));
    }
}
