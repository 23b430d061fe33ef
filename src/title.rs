//! Ticket title composition with a deterministic fallback.

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::PipelineError;
use crate::metrics::TITLE_GENERATION_DURATION;
use crate::openai::OpenAiClient;
use crate::schema::Category;

pub const MAX_TITLE_CHARS: usize = 60;

/// Titles consider at most the first messages of a ticket.
const TITLE_CONTEXT_MESSAGES: usize = 5;

const TITLE_SYSTEM_PROMPT: &str = r#"You are a ticket title generator for an issue-tracking dashboard.

Generate a SHORT, concise title (max 60 characters, ideally 3-6 words) that captures the core issue or request.

Guidelines:
- Be BRIEF and to the point (like "Mobile Login Button Issue")
- Use title case (capitalize important words)
- Focus on the KEY problem/request only
- Remove filler words like "I just wanted to check in regarding..."
- For bugs: "What" + "Where" format (e.g., "Mobile Login Button Issue", "Export Feature Broken")
- For features: "Add" + "What" format (e.g., "Add CSV Export", "Dark Mode Request")
- For support: "How to" or question format (e.g., "Password Reset Help", "Export Data Guide")
- For questions: Direct question or topic (e.g., "Enterprise Pricing", "Feature Launch Date")

Examples:
- "i just wanted to check in regarding the mobile login button" → "Mobile Login Button Issue"
- "Can you add CSV export?" → "Add CSV Export"
- "The app crashes when I click export" → "Export Click Crash"
- "How do I reset my password?" → "Password Reset Help"
- "The login button doesn't work on mobile" → "Mobile Login Button Issue"

Respond ONLY with the title, no quotes, no explanation, no periods at the end."#;

const STOP_WORDS: &[&str] = &[
    "i", "just", "wanted", "to", "check", "in", "regarding", "the", "a", "an", "is", "are", "was",
    "were", "can", "you", "please", "thanks", "thank",
];

#[async_trait]
pub trait ComposeTitle: Send + Sync {
    /// Compose a canonical title from the ticket's first messages. Never
    /// fails: a generation fault falls back to the deterministic word-filter
    /// path.
    async fn compose(&self, messages: &[String], category: Category) -> String;
}

pub struct TitleGenerator {
    ai: OpenAiClient,
    model: String,
}

impl TitleGenerator {
    pub fn new(ai: OpenAiClient, model: impl Into<String>) -> Self {
        Self {
            ai,
            model: model.into(),
        }
    }

    async fn run(&self, messages: &[String], category: Category) -> Result<String, PipelineError> {
        let context = messages
            .iter()
            .take(TITLE_CONTEXT_MESSAGES)
            .enumerate()
            .map(|(i, msg)| format!("Message {}: {}", i + 1, msg))
            .collect::<Vec<_>>()
            .join("\n\n");
        let user_prompt =
            format!("Category: {category}\n\nMessages:\n{context}\n\nGenerate a concise title:");

        let raw = self
            .ai
            .chat_text(&self.model, 0.3, 50, TITLE_SYSTEM_PROMPT, &user_prompt)
            .await?;
        Ok(clean_title(&raw))
    }
}

#[async_trait]
impl ComposeTitle for TitleGenerator {
    async fn compose(&self, messages: &[String], category: Category) -> String {
        let _timer = TITLE_GENERATION_DURATION.start_timer();
        match self.run(messages, category).await {
            Ok(title) if !title.is_empty() => {
                debug!(title = %title, "Generated ticket title");
                title
            }
            Ok(_) => {
                warn!("Title generation returned empty output, using fallback");
                fallback_title(messages)
            }
            Err(err) => {
                warn!(error = %err, "Title generation failed, using fallback");
                fallback_title(messages)
            }
        }
    }
}

/// Normalize a model-produced title: strip wrapping quotes and trailing
/// period, enforce the length cap.
fn clean_title(raw: &str) -> String {
    let mut title = raw.trim();
    if (title.starts_with('"') && title.ends_with('"') && title.len() >= 2)
        || (title.starts_with('\'') && title.ends_with('\'') && title.len() >= 2)
    {
        title = &title[1..title.len() - 1];
    }
    let title = title.trim().trim_end_matches('.');
    truncate_with_ellipsis(title, MAX_TITLE_CHARS)
}

/// Deterministic title from the first message: drop stop words, keep the
/// first four words longer than two characters, title-case them. Empty
/// result falls back to the truncated raw message.
pub fn fallback_title(messages: &[String]) -> String {
    let Some(first) = messages.first() else {
        return "New Ticket".to_string();
    };

    let key_words: Vec<String> = first
        .to_lowercase()
        .split_whitespace()
        .filter(|w| w.len() > 2 && !STOP_WORDS.contains(w))
        .take(4)
        .map(title_case)
        .collect();

    if !key_words.is_empty() {
        return truncate_with_ellipsis(&key_words.join(" "), MAX_TITLE_CHARS);
    }
    truncate_with_ellipsis(first.trim(), MAX_TITLE_CHARS)
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn truncate_with_ellipsis(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max - 3;
    while end > 0 && !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_drops_stop_words_and_title_cases() {
        let messages = vec!["i just wanted to check in regarding the mobile login button".into()];
        assert_eq!(fallback_title(&messages), "Mobile Login Button");
    }

    #[test]
    fn fallback_is_deterministic() {
        let messages = vec!["Can you add CSV export?".into()];
        assert_eq!(fallback_title(&messages), fallback_title(&messages));
    }

    #[test]
    fn fallback_keeps_at_most_four_words() {
        let messages =
            vec!["export dashboard metrics broken again after latest deploy window".into()];
        let title = fallback_title(&messages);
        assert_eq!(title.split_whitespace().count(), 4);
    }

    #[test]
    fn fallback_truncates_when_no_key_words_survive() {
        let messages = vec!["is is is".into()];
        assert_eq!(fallback_title(&messages), "is is is");
    }

    #[test]
    fn fallback_on_empty_message_set() {
        assert_eq!(fallback_title(&[]), "New Ticket");
    }

    #[test]
    fn clean_title_strips_quotes_and_period() {
        assert_eq!(clean_title("\"Add CSV Export.\""), "Add CSV Export");
    }

    #[test]
    fn clean_title_caps_length() {
        let raw = "A".repeat(100);
        let title = clean_title(&raw);
        assert_eq!(title.len(), MAX_TITLE_CHARS);
        assert!(title.ends_with("..."));
    }
}
