use std::time::Duration;

use async_trait::async_trait;
use desky_core::domain::intent::Intent;
use desky_core::domain::session::Turn;
use desky_core::manager::Classifier;
use tracing::{debug, warn};

use crate::llm::{CompletionRequest, LlmClient};

pub const CLASSIFY_TEMPERATURE: f32 = 0.1;
pub const CLASSIFY_MAX_OUTPUT_TOKENS: u32 = 20;

const RETRY_BACKOFF: Duration = Duration::from_millis(300);
const HISTORY_WINDOW: usize = 4;

/// Labels customer messages with one of the routable intents.
///
/// Failures degrade instead of propagating: transient errors are retried up
/// to `max_retries` times, and anything still failing after that resolves to
/// `Intent::Unknown` so the conversation falls back to a canned reply.
pub struct IntentClassifier<C> {
    llm: C,
    max_retries: u32,
}

impl<C> IntentClassifier<C>
where
    C: LlmClient,
{
    pub fn new(llm: C, max_retries: u32) -> Self {
        Self { llm, max_retries }
    }
}

#[async_trait]
impl<C> Classifier for IntentClassifier<C>
where
    C: LlmClient,
{
    async fn classify(&self, message: &str, history: &[Turn]) -> Intent {
        let request = CompletionRequest {
            prompt: build_prompt(message, history),
            temperature: CLASSIFY_TEMPERATURE,
            max_output_tokens: CLASSIFY_MAX_OUTPUT_TOKENS,
        };

        let mut attempt = 0u32;
        loop {
            match self.llm.complete(request.clone()).await {
                Ok(reply) => {
                    let intent = parse_reply(&reply);
                    debug!(
                        event_name = "classifier.intent.resolved",
                        intent = intent.label(),
                        "classified customer message"
                    );
                    return intent;
                }
                Err(error) if error.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    warn!(
                        event_name = "classifier.intent.retry",
                        attempt,
                        error = %error,
                        "model call failed, retrying"
                    );
                    tokio::time::sleep(RETRY_BACKOFF).await;
                }
                Err(error) => {
                    warn!(
                        event_name = "classifier.intent.failed",
                        error = %error,
                        "model call failed, routing to fallback"
                    );
                    return Intent::Unknown;
                }
            }
        }
    }
}

fn build_prompt(message: &str, history: &[Turn]) -> String {
    let intent_list = Intent::CLASSIFIABLE
        .iter()
        .map(|intent| format!("'{}'", intent.label()))
        .collect::<Vec<_>>()
        .join(", ");

    let mut prompt = String::new();
    let recent = recent_turns(history);
    if !recent.is_empty() {
        prompt.push_str("Recent conversation:\n");
        for turn in recent {
            prompt.push_str(turn.role.as_str());
            prompt.push_str(": ");
            prompt.push_str(&turn.text);
            prompt.push('\n');
        }
    }

    prompt.push_str(&format!(
        "\nAnalyze the following user message and determine the primary intent.\n\
         The available intents are: {intent_list}, 'general_query'.\n\n\
         User Message: \"{message}\"\n\n\
         Based *only* on the user message and the available intents, which intent best \
         describes the user's goal?\n\
         Respond with *only* the single intent name from the list (e.g., 'check_order_status', \
         'ask_return_policy', 'request_human', 'general_query').\n\
         Do not add any explanation or other text.\n\
         Intent:"
    ));
    prompt
}

/// Models wrap labels in quotes or change casing often enough that the raw
/// reply is normalized before the lookup. Anything that still fails the
/// lookup is routed as a general query.
fn parse_reply(reply: &str) -> Intent {
    let cleaned: String =
        reply.trim().chars().filter(|ch| !matches!(ch, '\'' | '"')).collect();
    let cleaned = cleaned.trim().to_ascii_lowercase();

    match Intent::from_label(&cleaned) {
        Some(Intent::Unknown) | None => Intent::GeneralQuery,
        Some(intent) => intent,
    }
}

fn recent_turns(history: &[Turn]) -> &[Turn] {
    let start = history.len().saturating_sub(HISTORY_WINDOW);
    &history[start..]
}
