use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Issue category assigned by the classifier. Stored on the ticket as a
/// seed/display value; grouping never filters on it beyond the similarity
/// tie-break preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Support,
    Bug,
    Feature,
    Question,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Support => "support",
            Category::Bug => "bug",
            Category::Feature => "feature",
            Category::Question => "question",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Open,
    Closed,
}

/// A raw chat event as delivered by the transport topic.
///
/// `message_id` is the platform's monotonic per-channel timestamp string;
/// together with `channel_id` it forms the identity key used for
/// deduplication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundEvent {
    pub channel_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    pub message_id: String,
    pub author_id: String,
    pub text: String,
}

impl InboundEvent {
    /// Opaque identity key, unique and immutable per event.
    pub fn event_key(&self) -> String {
        format!("{}:{}", self.channel_id, self.message_id)
    }
}

/// Classifier verdict for one message.
#[derive(Debug, Clone, Deserialize)]
pub struct Classification {
    pub is_relevant: bool,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: String,
}

impl Classification {
    /// The fail-closed default: an unclassifiable message must never spawn
    /// a ticket.
    pub fn not_relevant(reasoning: impl Into<String>) -> Self {
        Self {
            is_relevant: false,
            category: None,
            confidence: 0.0,
            reasoning: reasoning.into(),
        }
    }
}

/// Pairwise same-issue verdict from the grouping judge.
#[derive(Debug, Clone, Deserialize)]
pub struct SameIssueJudgment {
    pub is_same_issue: bool,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub reasoning: String,
}

impl SameIssueJudgment {
    pub fn no_match(reasoning: impl Into<String>) -> Self {
        Self {
            is_same_issue: false,
            confidence: 0.0,
            reasoning: reasoning.into(),
        }
    }
}

/// A durable record of one distinct issue/request.
///
/// `anchor_id` is the thread id the ticket originated in, else the first
/// message's id; the thread tier looks tickets up by it. The anchoring
/// message's embedding lives in the stored row for similarity queries but is
/// not part of the read model (see [`NewTicket`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub id: String,
    pub title: String,
    pub category: Category,
    pub status: TicketStatus,
    pub channel_id: String,
    pub anchor_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub last_author_name: Option<String>,
    /// Count of stored messages, maintained store-side on message insert;
    /// reads taken before an insert still show the prior count.
    #[serde(default)]
    pub message_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload for a new ticket.
#[derive(Debug, Clone, Serialize)]
pub struct NewTicket {
    pub title: String,
    pub category: Category,
    pub status: TicketStatus,
    pub channel_id: String,
    pub anchor_id: String,
    pub embedding: Vec<f32>,
}

/// Partial update for a ticket; only set fields are written.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TicketUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TicketStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_author_name: Option<String>,
}

/// One processed chat message, created exactly once per identity key and
/// never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: String,
    pub ticket_id: String,
    pub event_key: String,
    pub text: String,
    pub author_id: String,
    pub author_name: String,
    pub channel_id: String,
    #[serde(default)]
    pub thread_id: Option<String>,
    pub message_id: String,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a stored message.
#[derive(Debug, Clone, Serialize)]
pub struct NewMessage {
    pub ticket_id: String,
    pub event_key: String,
    pub text: String,
    pub author_id: String,
    pub author_name: String,
    pub channel_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    pub message_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    Created,
    TitleUpdated,
    StatusChanged,
    Merged,
}

/// Append-only audit entry for a ticket.
#[derive(Debug, Clone, Serialize)]
pub struct NewHistoryEntry {
    pub ticket_id: String,
    pub action: HistoryAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actor: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

impl NewHistoryEntry {
    pub fn created(ticket_id: &str, title: &str) -> Self {
        Self {
            ticket_id: ticket_id.to_string(),
            action: HistoryAction::Created,
            old_value: None,
            new_value: Some(title.to_string()),
            actor: None,
            metadata: None,
        }
    }

    pub fn title_updated(ticket_id: &str, old: &str, new: &str) -> Self {
        Self {
            ticket_id: ticket_id.to_string(),
            action: HistoryAction::TitleUpdated,
            old_value: Some(old.to_string()),
            new_value: Some(new.to_string()),
            actor: None,
            metadata: None,
        }
    }

    pub fn merged(ticket_id: &str, into_ticket_id: &str, similarity: f64) -> Self {
        Self {
            ticket_id: ticket_id.to_string(),
            action: HistoryAction::Merged,
            old_value: None,
            new_value: Some(into_ticket_id.to_string()),
            actor: None,
            metadata: Some(serde_json::json!({ "similarity": similarity })),
        }
    }
}

/// One ranked candidate from the vector-similarity search. Results arrive
/// ordered by `similarity`, non-increasing.
#[derive(Debug, Clone, Deserialize)]
pub struct SimilarTicket {
    #[serde(flatten)]
    pub ticket: Ticket,
    pub similarity: f64,
}

/// A ticket with its messages nested, as the dashboard read API consumes it.
#[derive(Debug, Clone, Deserialize)]
pub struct TicketWithMessages {
    #[serde(flatten)]
    pub ticket: Ticket,
    #[serde(default)]
    pub messages: Vec<StoredMessage>,
}
