//! Per-message retrieval gating via a cheap classification call.
//!
//! The classifier sees the current message plus a short window of prior
//! conversational turns (system messages excluded). Anything other than a
//! clean "no", including timeouts and provider errors, means retrieve: an
//! unnecessary retrieval beats a silently missed one.

use std::sync::Arc;
use std::time::Duration;

use sift_llm::provider::{LlmProvider, Message, Role};

use crate::config::GateConfig;

const CLASSIFIER_INSTRUCTION: &str = "You decide whether answering the user's latest message requires \
     looking up the user's indexed documents. Consider the conversation \
     context. Reply with exactly one word: yes or no.";

pub struct IntentGate<P: LlmProvider> {
    provider: Arc<P>,
    config: GateConfig,
}

impl<P: LlmProvider> IntentGate<P> {
    #[must_use]
    pub fn new(provider: Arc<P>, config: GateConfig) -> Self {
        Self { provider, config }
    }

    /// Decide whether retrieval should run for this message.
    ///
    /// Decisions are never cached: intent depends on conversational context
    /// that changes every turn.
    pub async fn should_retrieve(&self, message: &str, history: &[Message]) -> bool {
        let prompt = build_prompt(message, history, &self.config);
        let deadline = Duration::from_millis(self.config.timeout_ms);

        match tokio::time::timeout(deadline, self.provider.complete(&prompt)).await {
            Ok(Ok(response)) => parse_decision(&response),
            Ok(Err(e)) => {
                tracing::warn!("intent classification failed, retrieving anyway: {e}");
                true
            }
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.config.timeout_ms,
                    "intent classification timed out, retrieving anyway"
                );
                true
            }
        }
    }
}

fn build_prompt(message: &str, history: &[Message], config: &GateConfig) -> Vec<Message> {
    let mut transcript = String::new();

    let recent: Vec<&Message> = history
        .iter()
        .filter(|m| m.role != Role::System)
        .rev()
        .take(config.history_turns)
        .collect();

    for turn in recent.into_iter().rev() {
        let label = match turn.role {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => continue,
        };
        transcript.push_str(label);
        transcript.push_str(": ");
        transcript.push_str(&truncate_chars(&turn.content, config.max_turn_chars));
        transcript.push('\n');
    }

    transcript.push_str("user: ");
    transcript.push_str(&truncate_chars(message, config.max_turn_chars));
    transcript.push_str("\n\nDoes this message need document lookup? Answer yes or no.");

    vec![
        Message::system(CLASSIFIER_INSTRUCTION),
        Message::user(transcript),
    ]
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        text.chars().take(max_chars).collect()
    }
}

/// Strict yes/no parse; anything else defaults to "retrieve".
fn parse_decision(response: &str) -> bool {
    let first_word: String = response
        .trim()
        .chars()
        .skip_while(|c| !c.is_alphabetic())
        .take_while(char::is_ascii_alphabetic)
        .collect::<String>()
        .to_ascii_lowercase();

    first_word != "no"
}
