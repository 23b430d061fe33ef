//! Per-event processing pipeline:
//! dedup → {classify, embed} → relevance gate → grouping → persistence →
//! title/name refresh.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::classifier::Classify;
use crate::dedup::DeduplicationChecker;
use crate::directory::NameDirectory;
use crate::embeddings::Embed;
use crate::error::PipelineError;
use crate::metrics::{PIPELINE_DURATION, SLA_BREACHES};
use crate::resolver::{GroupingResolver, ResolveRequest};
use crate::schema::{
    Category, InboundEvent, NewHistoryEntry, NewMessage, Ticket, TicketUpdate,
};
use crate::store::{HistoryStore, MessageStore, TicketStore};
use crate::title::ComposeTitle;

/// Wall-clock target per event; exceeding it is logged, not failed.
const SOFT_SLA: Duration = Duration::from_secs(8);

/// How one event left the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Processed { ticket_id: String },
    Duplicate,
    Irrelevant,
    Invalid,
}

pub struct Pipeline {
    dedup: DeduplicationChecker,
    classifier: Arc<dyn Classify>,
    embedder: Arc<dyn Embed>,
    resolver: GroupingResolver,
    directory: Arc<dyn NameDirectory>,
    tickets: Arc<dyn TicketStore>,
    messages: Arc<dyn MessageStore>,
    history: Arc<dyn HistoryStore>,
    titles: Arc<dyn ComposeTitle>,
}

impl Pipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        classifier: Arc<dyn Classify>,
        embedder: Arc<dyn Embed>,
        resolver: GroupingResolver,
        directory: Arc<dyn NameDirectory>,
        tickets: Arc<dyn TicketStore>,
        messages: Arc<dyn MessageStore>,
        history: Arc<dyn HistoryStore>,
        titles: Arc<dyn ComposeTitle>,
    ) -> Self {
        Self {
            dedup: DeduplicationChecker::new(messages.clone()),
            classifier,
            embedder,
            resolver,
            directory,
            tickets,
            messages,
            history,
            titles,
        }
    }

    /// Run one event through the full pipeline.
    ///
    /// An `Err` leaves the event unprocessed: nothing was written under its
    /// identity key, so transport redelivery retries the whole pipeline.
    pub async fn process(&self, event: InboundEvent) -> Result<Outcome, PipelineError> {
        let started = Instant::now();
        let _timer = PIPELINE_DURATION.start_timer();

        if event.text.trim().is_empty()
            || event.author_id.is_empty()
            || event.channel_id.is_empty()
        {
            warn!(
                channel_id = %event.channel_id,
                message_id = %event.message_id,
                "Dropping event with missing required fields"
            );
            return Ok(Outcome::Invalid);
        }

        let event_key = event.event_key();
        info!(event_key = %event_key, "Processing message");

        if self.dedup.seen(&event_key).await {
            return Ok(Outcome::Duplicate);
        }

        // Classification and embedding are independent; run both, join, and
        // let an embedding fault abort before any write happens.
        let (classification, embedding) = tokio::join!(
            self.classifier.classify(&event.text),
            self.embedder.embed(&event.text)
        );
        let embedding = embedding?;

        if !classification.is_relevant {
            info!(reasoning = %classification.reasoning, "Message not relevant, skipping");
            return Ok(Outcome::Irrelevant);
        }
        let category = classification.category.unwrap_or(Category::Question);

        let ticket = self
            .resolver
            .resolve(ResolveRequest {
                text: &event.text,
                embedding: &embedding,
                category,
                channel_id: &event.channel_id,
                thread_id: event.thread_id.as_deref(),
                message_id: &event.message_id,
            })
            .await?;

        // Author and channel display names are independent lookups.
        let (author_name, channel_name) = tokio::join!(
            self.directory.author_name(&event.author_id),
            self.directory.channel_name(&event.channel_id)
        );

        self.messages
            .insert(NewMessage {
                ticket_id: ticket.id.clone(),
                event_key,
                text: event.text.clone(),
                author_id: event.author_id.clone(),
                author_name: author_name.clone().unwrap_or_else(|| "Unknown".to_string()),
                channel_id: event.channel_id.clone(),
                thread_id: event.thread_id.clone(),
                message_id: event.message_id.clone(),
            })
            .await?;

        // Recompose the title once the ticket holds more than its opening
        // message; a fault here is logged, the message itself is safe.
        if ticket.message_count >= 1 {
            match self.refresh_title(&ticket).await {
                Ok(Some(title)) => {
                    info!(ticket_id = %ticket.id, title = %title, "Updated ticket title");
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(ticket_id = %ticket.id, error = %err, "Failed to refresh ticket title");
                }
            }
        }

        self.refresh_metadata(&ticket, channel_name.as_deref(), author_name.as_deref())
            .await?;

        let elapsed = started.elapsed();
        info!(
            ticket_id = %ticket.id,
            elapsed_s = elapsed.as_secs_f64(),
            "Message processed"
        );
        if elapsed > SOFT_SLA {
            SLA_BREACHES.inc();
            warn!(
                elapsed_s = elapsed.as_secs_f64(),
                "Processing exceeded the 8s soft target"
            );
        }

        Ok(Outcome::Processed {
            ticket_id: ticket.id,
        })
    }

    /// Recompose the title from the ticket's messages; write it back (with
    /// an audit entry) only when it differs from the stored one.
    async fn refresh_title(&self, ticket: &Ticket) -> Result<Option<String>, PipelineError> {
        let all = self.messages.for_ticket(&ticket.id).await?;
        let texts: Vec<String> = all.into_iter().map(|m| m.text).collect();
        let new_title = self.titles.compose(&texts, ticket.category).await;

        if new_title == ticket.title {
            return Ok(None);
        }
        self.tickets
            .update(
                &ticket.id,
                TicketUpdate {
                    title: Some(new_title.clone()),
                    ..Default::default()
                },
            )
            .await?;
        self.history
            .append(NewHistoryEntry::title_updated(
                &ticket.id,
                &ticket.title,
                &new_title,
            ))
            .await?;
        Ok(Some(new_title))
    }

    /// Refresh the cached channel display name and last author when they
    /// changed; a single write covers both.
    async fn refresh_metadata(
        &self,
        ticket: &Ticket,
        channel_name: Option<&str>,
        author_name: Option<&str>,
    ) -> Result<(), PipelineError> {
        let mut update = TicketUpdate::default();
        if let Some(name) = channel_name {
            if ticket.display_name.as_deref() != Some(name) {
                update.display_name = Some(name.to_string());
            }
        }
        if let Some(name) = author_name {
            if ticket.last_author_name.as_deref() != Some(name) {
                update.last_author_name = Some(name.to_string());
            }
        }
        if update.display_name.is_some() || update.last_author_name.is_some() {
            self.tickets.update(&ticket.id, update).await?;
        }
        Ok(())
    }
}
