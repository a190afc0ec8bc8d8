//! Interactive chat about one video.
//!
//! History lives in memory for the session only and is passed to every turn.

use crate::cli::preflight;
use crate::cli::Output;
use crate::config::Settings;
use crate::error::TubeQaError;
use crate::orchestrator::Pipeline;
use crate::rag::{ChatTurn, NO_TRANSCRIPT};
use crate::transcript::normalize_video_id;
use anyhow::Result;
use console::style;
use std::io::{self, BufRead, Write};

/// Run the interactive chat command.
pub async fn run_chat(video: &str, settings: Settings) -> Result<()> {
    if let Err(e) = preflight::check(&settings) {
        Output::error(&format!("{}", e));
        Output::info("Run 'tubeqa doctor' for detailed diagnostics.");
        return Err(e.into());
    }

    let pipeline = Pipeline::new(&settings)?;
    let video_id = normalize_video_id(video);

    // The transcript is fetched and indexed once for the whole session
    let spinner = Output::spinner("Preparing transcript index...");
    let prepared = pipeline.prepare_index(&video_id, false).await;
    spinner.finish_and_clear();
    let index = match prepared {
        Ok(Some(index)) => {
            Output::info(&format!("{} chunks indexed for {}", index.len(), video_id));
            index
        }
        Ok(None) => {
            Output::warning(NO_TRANSCRIPT);
            return Ok(());
        }
        Err(e) => {
            Output::error(&format!("Failed to index {}: {}", video_id, e));
            return Err(e.into());
        }
    };

    let mut session = ChatSession::new(30);

    println!("\n{}", style("tubeqa chat").bold().cyan());
    println!(
        "{}\n",
        style("Type your questions, or 'exit' to quit. Use 'clear' to reset conversation.").dim()
    );

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("{} ", style("You:").green().bold());
        stdout.flush()?;

        let mut input = String::new();
        if stdin.lock().read_line(&mut input)? == 0 {
            break;
        }

        let input = input.trim();

        if input.is_empty() {
            continue;
        }

        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            Output::info("Goodbye!");
            break;
        }

        if input.eq_ignore_ascii_case("clear") {
            session.clear();
            Output::info("Conversation history cleared.");
            continue;
        }

        print!("\n{} ", style("tubeqa:").cyan().bold());
        stdout.flush()?;

        let mut streamed = false;
        let result = pipeline
            .answer_with(&index, input, session.history(), |fragment| {
                streamed = true;
                let mut out = io::stdout();
                let _ = write!(out, "{}", fragment);
                let _ = out.flush();
            })
            .await;

        match result {
            Ok(result) => {
                // Fallback answers are not streamed
                if !streamed {
                    print!("{}", result.answer);
                }
                println!();
                for ts in &result.timestamps {
                    Output::timestamp(ts, &video_id);
                }
                println!();
                session.record(input, &result.answer);
            }
            Err(TubeQaError::GenerationFailed { message, partial }) => {
                println!();
                Output::error(&format!("Answer interrupted: {}", message));
                if !partial.is_empty() {
                    Output::info("The partial answer was not added to the conversation.");
                }
            }
            Err(e) => {
                println!();
                Output::error(&format!("Error: {}", e));
            }
        }
    }

    Ok(())
}

/// In-memory conversation history for one chat session.
struct ChatSession {
    turns: Vec<ChatTurn>,
    max_turns: usize,
}

impl ChatSession {
    fn new(max_turns: usize) -> Self {
        Self {
            turns: Vec::new(),
            max_turns,
        }
    }

    fn history(&self) -> &[ChatTurn] {
        &self.turns
    }

    fn clear(&mut self) {
        self.turns.clear();
    }

    /// Append a question/answer exchange, dropping the oldest exchanges
    /// once the history exceeds `max_turns`.
    fn record(&mut self, question: &str, answer: &str) {
        self.turns.push(ChatTurn::user(question));
        self.turns.push(ChatTurn::assistant(answer));

        if self.turns.len() > self.max_turns {
            let excess = self.turns.len() - self.max_turns;
            // Keep user/assistant pairs together
            let drop = excess + excess % 2;
            self.turns.drain(..drop.min(self.turns.len()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;

    #[test]
    fn test_record_appends_pairs() {
        let mut session = ChatSession::new(10);
        session.record("what?", "this.");
        assert_eq!(
            session.history(),
            &[ChatTurn::user("what?"), ChatTurn::assistant("this.")]
        );
    }

    #[test]
    fn test_history_is_trimmed_oldest_first() {
        let mut session = ChatSession::new(4);
        session.record("q1", "a1");
        session.record("q2", "a2");
        session.record("q3", "a3");

        let history = session.history();
        assert_eq!(history.len(), 4);
        assert_eq!(history[0], ChatTurn::user("q2"));
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[3], ChatTurn::assistant("a3"));
    }

    #[test]
    fn test_clear() {
        let mut session = ChatSession::new(4);
        session.record("q", "a");
        session.clear();
        assert!(session.history().is_empty());
    }
}
