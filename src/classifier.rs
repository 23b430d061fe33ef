//! Relevance and category classification for incoming messages.

use async_trait::async_trait;
use tracing::{error, info};

use crate::error::PipelineError;
use crate::metrics::CLASSIFICATION_DURATION;
use crate::openai::{truncate_for_model, OpenAiClient};
use crate::schema::Classification;

const CLASSIFICATION_SYSTEM_PROMPT: &str = r#"You are a message classifier for a customer-facing engineering team.

Classify chat messages into categories. The team needs to see:
- SUPPORT: Questions about how to use the product ("How do I export data?", "Where is the settings page?")
- BUG: Reports of things not working ("Login button is broken", "Error on page load", "Feature X crashes")
- FEATURE: Requests for new functionality ("Can you add dark mode?", "Need CSV export", "Would be great if...")
- QUESTION: General product questions ("When will feature X launch?", "What does this do?", "How does Y work?")

IGNORE (mark as not relevant):
- Casual chat: "thanks", "sounds good", "let's get dinner", "ok", "sure", "got it"
- Greetings: "good morning", "hey", "how are you", "hello"
- Social: "have a good weekend", "see you tomorrow", "catch you later"
- Emoji-only or very short: "👍", "😊", "ok", "yep"
- Off-topic: Weather, sports, personal life, unrelated topics

Respond ONLY with valid JSON:
{
  "is_relevant": true/false,
  "category": "support" | "bug" | "feature" | "question" | null,
  "confidence": 0.85,
  "reasoning": "Brief explanation"
}"#;

#[async_trait]
pub trait Classify: Send + Sync {
    /// Classify one message. Never fails: any fault collapses to the
    /// not-relevant default so an unclassifiable message cannot spawn a
    /// ticket.
    async fn classify(&self, text: &str) -> Classification;
}

pub struct Classifier {
    ai: OpenAiClient,
    model: String,
}

impl Classifier {
    pub fn new(ai: OpenAiClient, model: impl Into<String>) -> Self {
        Self {
            ai,
            model: model.into(),
        }
    }

    async fn run(&self, text: &str) -> Result<Classification, PipelineError> {
        let text = truncate_for_model(text);
        let value = self
            .ai
            .chat_json(&self.model, 0.3, CLASSIFICATION_SYSTEM_PROMPT, &text)
            .await?;
        let classification: Classification =
            serde_json::from_value(value).map_err(|e| PipelineError::Parse(e.to_string()))?;
        Ok(classification)
    }
}

#[async_trait]
impl Classify for Classifier {
    async fn classify(&self, text: &str) -> Classification {
        let _timer = CLASSIFICATION_DURATION.start_timer();
        match self.run(text).await {
            Ok(c) => {
                // Invariant: a relevant verdict must carry a category.
                if c.is_relevant && c.category.is_none() {
                    error!("Classifier returned relevant verdict without category");
                    return Classification::not_relevant("relevant verdict missing category");
                }
                info!(
                    is_relevant = c.is_relevant,
                    category = c.category.map(|c| c.as_str()),
                    confidence = c.confidence,
                    "Classified message"
                );
                c
            }
            Err(err) => {
                error!(error = %err, "Classification failed, defaulting to not relevant");
                Classification::not_relevant(format!("classification failed: {err}"))
            }
        }
    }
}
