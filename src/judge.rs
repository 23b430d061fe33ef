//! Pairwise same-issue judgment between a new message and a ticket's
//! anchoring message.

use async_trait::async_trait;
use tracing::{debug, error};

use crate::error::PipelineError;
use crate::openai::{truncate_for_model, OpenAiClient};
use crate::schema::SameIssueJudgment;

const SAME_ISSUE_SYSTEM_PROMPT: &str = r#"You are a message relationship analyzer for a customer-facing engineering team.

Determine if two messages are about the SAME issue/topic, even if worded differently or sent hours/days apart.

Examples of SAME issue:
- "Can you add CSV export?" + "I don't see a button for CSV export" → SAME (both about CSV export feature)
- "Login button broken" + "The login doesn't work on mobile" → SAME (both about login issue)
- "How do I export data?" + "Where is the export feature?" → SAME (both asking about export)

Examples of DIFFERENT issues:
- "Can you add CSV export?" + "The login button is broken" → DIFFERENT (different features)
- "Export feature broken" + "How do I login?" → DIFFERENT (different topics)

Respond ONLY with valid JSON:
{
  "is_same_issue": true/false,
  "confidence": 0.90,
  "reasoning": "Brief explanation of why they are/aren't the same issue"
}"#;

#[async_trait]
pub trait JudgeSameIssue: Send + Sync {
    /// Compare a new message against a ticket's anchoring message. Never
    /// fails: any fault collapses to a no-match verdict, which only means
    /// the cascade falls through to the next tier.
    async fn same_issue(
        &self,
        message: &str,
        anchor: &str,
        ticket_title: Option<&str>,
    ) -> SameIssueJudgment;
}

pub struct GroupingJudge {
    ai: OpenAiClient,
    model: String,
}

impl GroupingJudge {
    pub fn new(ai: OpenAiClient, model: impl Into<String>) -> Self {
        Self {
            ai,
            model: model.into(),
        }
    }

    async fn run(
        &self,
        message: &str,
        anchor: &str,
        ticket_title: Option<&str>,
    ) -> Result<SameIssueJudgment, PipelineError> {
        let mut prompt = format!(
            "Message 1: \"{}\"\n\nMessage 2: \"{}\"\n",
            truncate_for_model(anchor),
            truncate_for_model(message)
        );
        if let Some(title) = ticket_title {
            prompt.push_str(&format!("\nExisting ticket title: \"{title}\"\n"));
        }
        prompt.push_str("\nAre these messages about the SAME issue/topic?");

        let value = self
            .ai
            .chat_json(&self.model, 0.2, SAME_ISSUE_SYSTEM_PROMPT, &prompt)
            .await?;
        serde_json::from_value(value).map_err(|e| PipelineError::Parse(e.to_string()))
    }
}

#[async_trait]
impl JudgeSameIssue for GroupingJudge {
    async fn same_issue(
        &self,
        message: &str,
        anchor: &str,
        ticket_title: Option<&str>,
    ) -> SameIssueJudgment {
        match self.run(message, anchor, ticket_title).await {
            Ok(j) => {
                debug!(
                    is_same = j.is_same_issue,
                    confidence = j.confidence,
                    reasoning = %j.reasoning,
                    "Pairwise judgment"
                );
                j
            }
            Err(err) => {
                error!(error = %err, "Pairwise judgment failed, defaulting to not same");
                SameIssueJudgment::no_match(format!("judgment failed: {err}"))
            }
        }
    }
}
