//! Cascading multi-signal grouping resolver.
//!
//! Tiers run in fixed precedence order and the first hit wins: an explicit
//! thread reply is a user-asserted relation, the pairwise judgment is
//! costlier but still targeted, the vector search is the fuzziest signal,
//! and only when all three miss does a new ticket get created.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::GroupingConfig;
use crate::error::PipelineError;
use crate::judge::JudgeSameIssue;
use crate::metrics::{GROUPING_DURATION, TICKETS_CREATED, TICKETS_MERGED};
use crate::schema::{
    Category, NewHistoryEntry, NewTicket, Ticket, TicketStatus, TicketUpdate,
};
use crate::store::{HistoryStore, MessageStore, SimilarityQuery, TicketStore};
use crate::title::ComposeTitle;

/// Features of one message, as the resolver consumes them.
pub struct ResolveRequest<'a> {
    pub text: &'a str,
    pub embedding: &'a [f32],
    pub category: Category,
    pub channel_id: &'a str,
    pub thread_id: Option<&'a str>,
    pub message_id: &'a str,
}

/// One tier of the cascade: returns a terminal ticket or falls through.
#[async_trait]
pub trait ResolveTier: Send + Sync {
    fn name(&self) -> &'static str;

    async fn attempt(&self, req: &ResolveRequest<'_>) -> Result<Option<Ticket>, PipelineError>;
}

/// Exact lookup of an open ticket anchored at the reply thread.
pub struct ThreadTier {
    tickets: Arc<dyn TicketStore>,
}

#[async_trait]
impl ResolveTier for ThreadTier {
    fn name(&self) -> &'static str {
        "thread"
    }

    async fn attempt(&self, req: &ResolveRequest<'_>) -> Result<Option<Ticket>, PipelineError> {
        let Some(thread_id) = req.thread_id else {
            return Ok(None);
        };
        self.tickets
            .find_by_anchor(thread_id, req.channel_id, TicketStatus::Open)
            .await
    }
}

/// Pairwise AI judgment against recent open tickets, first match wins.
///
/// First-match rather than best-match: each judgment is an AI round-trip,
/// and candidates arrive most-recently-updated first.
pub struct JudgmentTier {
    tickets: Arc<dyn TicketStore>,
    messages: Arc<dyn MessageStore>,
    judge: Arc<dyn JudgeSameIssue>,
    cfg: GroupingConfig,
}

#[async_trait]
impl ResolveTier for JudgmentTier {
    fn name(&self) -> &'static str {
        "judgment"
    }

    async fn attempt(&self, req: &ResolveRequest<'_>) -> Result<Option<Ticket>, PipelineError> {
        let candidates = self
            .tickets
            .find_recent(
                req.channel_id,
                self.cfg.judgment_lookback_hours,
                self.cfg.judgment_candidate_limit,
            )
            .await?;

        for ticket in candidates {
            let messages = self.messages.for_ticket(&ticket.id).await?;
            // A ticket row without messages yet has nothing to judge against.
            let Some(anchor) = messages.first() else {
                continue;
            };
            let judgment = self
                .judge
                .same_issue(req.text, &anchor.text, Some(&ticket.title))
                .await;
            if judgment.is_same_issue
                && judgment.confidence >= self.cfg.judgment_confidence_threshold
            {
                info!(
                    ticket_id = %ticket.id,
                    confidence = judgment.confidence,
                    reasoning = %judgment.reasoning,
                    "Pairwise judgment matched"
                );
                return Ok(Some(ticket));
            }
        }
        Ok(None)
    }
}

/// Vector-similarity search over ticket anchor embeddings.
///
/// Tie-break: a candidate above the high-confidence cutoff is taken
/// unconditionally; below it, the first same-category candidate in rank
/// order is preferred; failing that the top candidate is taken anyway.
/// Recall over category purity.
pub struct SimilarityTier {
    tickets: Arc<dyn TicketStore>,
    cfg: GroupingConfig,
}

#[async_trait]
impl ResolveTier for SimilarityTier {
    fn name(&self) -> &'static str {
        "similarity"
    }

    async fn attempt(&self, req: &ResolveRequest<'_>) -> Result<Option<Ticket>, PipelineError> {
        let matches = self
            .tickets
            .find_similar(similarity_query(req, &self.cfg))
            .await?;

        let Some(top) = matches.first() else {
            return Ok(None);
        };
        if top.similarity >= self.cfg.high_confidence_threshold {
            info!(
                ticket_id = %top.ticket.id,
                similarity = top.similarity,
                "Similarity above high-confidence cutoff"
            );
            return Ok(Some(top.ticket.clone()));
        }
        if let Some(m) = matches.iter().find(|m| m.ticket.category == req.category) {
            return Ok(Some(m.ticket.clone()));
        }
        Ok(Some(top.ticket.clone()))
    }
}

fn similarity_query<'a>(req: &'a ResolveRequest<'_>, cfg: &GroupingConfig) -> SimilarityQuery<'a> {
    SimilarityQuery {
        embedding: req.embedding,
        channel_id: req.channel_id,
        time_window_minutes: cfg.time_window_minutes,
        similarity_threshold: cfg.similarity_threshold,
        max_results: cfg.similarity_max_results,
    }
}

/// Decides whether a message joins an existing ticket or starts a new one.
pub struct GroupingResolver {
    tiers: Vec<Box<dyn ResolveTier>>,
    tickets: Arc<dyn TicketStore>,
    history: Arc<dyn HistoryStore>,
    titles: Arc<dyn ComposeTitle>,
    cfg: GroupingConfig,
    /// Per-scope locks serializing resolution for one channel (or one
    /// thread within a channel). Entries are a few dozen bytes and live for
    /// the process.
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl GroupingResolver {
    pub fn new(
        tickets: Arc<dyn TicketStore>,
        messages: Arc<dyn MessageStore>,
        history: Arc<dyn HistoryStore>,
        judge: Arc<dyn JudgeSameIssue>,
        titles: Arc<dyn ComposeTitle>,
        cfg: GroupingConfig,
    ) -> Self {
        let tiers: Vec<Box<dyn ResolveTier>> = vec![
            Box::new(ThreadTier {
                tickets: tickets.clone(),
            }),
            Box::new(JudgmentTier {
                tickets: tickets.clone(),
                messages,
                judge,
                cfg,
            }),
            Box::new(SimilarityTier {
                tickets: tickets.clone(),
                cfg,
            }),
        ];
        Self {
            tiers,
            tickets,
            history,
            titles,
            cfg,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve a message to its ticket, creating one when every tier misses.
    ///
    /// Resolution is serialized per `(channel_id, thread_id?)` so two
    /// near-simultaneous events for the same scope cannot both reach the
    /// creation tier; the no-thread path additionally reconciles after
    /// insert against duplicates created by another process.
    pub async fn resolve(&self, req: ResolveRequest<'_>) -> Result<Ticket, PipelineError> {
        let _timer = GROUPING_DURATION.start_timer();

        let scope = match req.thread_id {
            Some(thread_id) => format!("{}:{}", req.channel_id, thread_id),
            None => req.channel_id.to_string(),
        };
        let lock = {
            let mut locks = self.locks.lock().await;
            locks
                .entry(scope)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        let _guard = lock.lock().await;

        for tier in &self.tiers {
            if let Some(ticket) = tier.attempt(&req).await? {
                info!(
                    tier = tier.name(),
                    ticket_id = %ticket.id,
                    "Grouped message into existing ticket"
                );
                return Ok(ticket);
            }
        }

        let created = self.create_ticket(&req).await?;
        if req.thread_id.is_none() {
            if let Some(survivor) = self.reconcile(&req, &created).await? {
                return Ok(survivor);
            }
        }
        Ok(created)
    }

    async fn create_ticket(&self, req: &ResolveRequest<'_>) -> Result<Ticket, PipelineError> {
        let title = self
            .titles
            .compose(&[req.text.to_string()], req.category)
            .await;
        let anchor_id = req.thread_id.unwrap_or(req.message_id).to_string();

        let ticket = self
            .tickets
            .insert(NewTicket {
                title,
                category: req.category,
                status: TicketStatus::Open,
                channel_id: req.channel_id.to_string(),
                anchor_id,
                embedding: req.embedding.to_vec(),
            })
            .await?;
        TICKETS_CREATED.inc();
        info!(ticket_id = %ticket.id, title = %ticket.title, "Created new ticket");

        self.history
            .append(NewHistoryEntry::created(&ticket.id, &ticket.title))
            .await?;
        Ok(ticket)
    }

    /// Optimistic create-then-reconcile for no-thread creations: another
    /// process may have created an equivalent ticket between our tier checks
    /// and our insert. Re-run the similarity query; when an older open
    /// ticket above the high-confidence cutoff shows up, close ours and
    /// return the older one.
    async fn reconcile(
        &self,
        req: &ResolveRequest<'_>,
        created: &Ticket,
    ) -> Result<Option<Ticket>, PipelineError> {
        let matches = self
            .tickets
            .find_similar(similarity_query(req, &self.cfg))
            .await?;

        // The older ticket survives; ids break timestamp ties.
        let survivor = matches.iter().find(|m| {
            m.ticket.id != created.id
                && m.similarity >= self.cfg.high_confidence_threshold
                && (m.ticket.created_at < created.created_at
                    || (m.ticket.created_at == created.created_at && m.ticket.id < created.id))
        });
        let Some(survivor) = survivor else {
            return Ok(None);
        };

        self.tickets
            .update(
                &created.id,
                TicketUpdate {
                    status: Some(TicketStatus::Closed),
                    ..Default::default()
                },
            )
            .await?;
        self.history
            .append(NewHistoryEntry::merged(
                &created.id,
                &survivor.ticket.id,
                survivor.similarity,
            ))
            .await?;
        TICKETS_MERGED.inc();
        warn!(
            closed = %created.id,
            survivor = %survivor.ticket.id,
            similarity = survivor.similarity,
            "Merged racing duplicate ticket"
        );
        Ok(Some(survivor.ticket.clone()))
    }
}
