//! Storage contracts consumed by the pipeline.
//!
//! One capability trait per table, so tests can substitute an in-memory
//! fake and a different persistence backend only needs a new adapter.

use async_trait::async_trait;

use crate::error::PipelineError;
use crate::schema::{
    NewHistoryEntry, NewMessage, NewTicket, SimilarTicket, StoredMessage, Ticket, TicketStatus,
    TicketUpdate, TicketWithMessages,
};

/// Inputs for the vector-similarity search over ticket anchor embeddings.
/// Results come back ranked by similarity, non-increasing, capped at
/// `max_results`.
#[derive(Debug, Clone)]
pub struct SimilarityQuery<'a> {
    pub embedding: &'a [f32],
    pub channel_id: &'a str,
    pub time_window_minutes: i64,
    pub similarity_threshold: f64,
    pub max_results: usize,
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Look up a message by its identity key (deduplication).
    async fn find_by_event_key(
        &self,
        event_key: &str,
    ) -> Result<Option<StoredMessage>, PipelineError>;

    async fn insert(&self, message: NewMessage) -> Result<StoredMessage, PipelineError>;

    /// All messages of a ticket, oldest first; the first one is the
    /// ticket's anchoring message.
    async fn for_ticket(&self, ticket_id: &str) -> Result<Vec<StoredMessage>, PipelineError>;
}

#[async_trait]
pub trait TicketStore: Send + Sync {
    /// Exact lookup by anchor within a channel, filtered by status.
    async fn find_by_anchor(
        &self,
        anchor_id: &str,
        channel_id: &str,
        status: TicketStatus,
    ) -> Result<Option<Ticket>, PipelineError>;

    /// Most recently updated open tickets in a channel within a lookback
    /// window, newest first.
    async fn find_recent(
        &self,
        channel_id: &str,
        hours: i64,
        limit: usize,
    ) -> Result<Vec<Ticket>, PipelineError>;

    async fn find_similar(
        &self,
        query: SimilarityQuery<'_>,
    ) -> Result<Vec<SimilarTicket>, PipelineError>;

    async fn insert(&self, ticket: NewTicket) -> Result<Ticket, PipelineError>;

    async fn update(&self, ticket_id: &str, update: TicketUpdate)
        -> Result<Ticket, PipelineError>;

    /// Tickets with nested messages, most recently updated first (dashboard
    /// read path).
    async fn list_with_messages(
        &self,
        limit: usize,
    ) -> Result<Vec<TicketWithMessages>, PipelineError>;
}

#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn append(&self, entry: NewHistoryEntry) -> Result<(), PipelineError>;
}
