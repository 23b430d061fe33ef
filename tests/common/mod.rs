//! In-memory fakes for the store and AI seams, shared by the integration
//! tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use uuid::Uuid;

use triage::classifier::Classify;
use triage::config::GroupingConfig;
use triage::directory::NameDirectory;
use triage::embeddings::Embed;
use triage::error::PipelineError;
use triage::judge::JudgeSameIssue;
use triage::pipeline::Pipeline;
use triage::resolver::GroupingResolver;
use triage::schema::{
    Category, Classification, NewHistoryEntry, NewMessage, NewTicket, SameIssueJudgment,
    SimilarTicket, StoredMessage, Ticket, TicketStatus, TicketUpdate, TicketWithMessages,
};
use triage::store::{HistoryStore, MessageStore, SimilarityQuery, TicketStore};
use triage::title::{fallback_title, ComposeTitle};

#[derive(Default)]
struct Inner {
    tickets: Vec<Ticket>,
    embeddings: HashMap<String, Vec<f32>>,
    messages: Vec<StoredMessage>,
    history: Vec<NewHistoryEntry>,
}

/// In-memory store covering all three storage contracts. Emulates the
/// storage-side behaviors the adapter relies on: `message_count` bumps on
/// message insert and a unique constraint on the event key.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    /// When set, `find_by_event_key` fails as if the store were down.
    pub fail_message_lookup: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn seed_ticket(&self, ticket: Ticket, embedding: Vec<f32>) {
        let mut inner = self.inner.lock().unwrap();
        inner.embeddings.insert(ticket.id.clone(), embedding);
        inner.tickets.push(ticket);
    }

    pub fn seed_message(&self, ticket_id: &str, text: &str) {
        let mut inner = self.inner.lock().unwrap();
        let message = StoredMessage {
            id: Uuid::new_v4().to_string(),
            ticket_id: ticket_id.to_string(),
            event_key: format!("seed:{}", Uuid::new_v4()),
            text: text.to_string(),
            author_id: "seed-author".to_string(),
            author_name: "Seed Author".to_string(),
            channel_id: "seed-channel".to_string(),
            thread_id: None,
            message_id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
        };
        inner.messages.push(message);
        if let Some(ticket) = inner.tickets.iter_mut().find(|t| t.id == ticket_id) {
            ticket.message_count += 1;
        }
    }

    pub fn tickets(&self) -> Vec<Ticket> {
        self.inner.lock().unwrap().tickets.clone()
    }

    pub fn messages(&self) -> Vec<StoredMessage> {
        self.inner.lock().unwrap().messages.clone()
    }

    pub fn history(&self) -> Vec<NewHistoryEntry> {
        self.inner.lock().unwrap().history.clone()
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f64 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    (dot / (na * nb)) as f64
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn find_by_event_key(
        &self,
        event_key: &str,
    ) -> Result<Option<StoredMessage>, PipelineError> {
        if self.fail_message_lookup.load(Ordering::SeqCst) {
            return Err(PipelineError::Storage("simulated lookup outage".into()));
        }
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .messages
            .iter()
            .find(|m| m.event_key == event_key)
            .cloned())
    }

    async fn insert(&self, message: NewMessage) -> Result<StoredMessage, PipelineError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.messages.iter().any(|m| m.event_key == message.event_key) {
            return Err(PipelineError::Storage(
                "duplicate key value violates unique constraint".into(),
            ));
        }
        let stored = StoredMessage {
            id: Uuid::new_v4().to_string(),
            ticket_id: message.ticket_id.clone(),
            event_key: message.event_key,
            text: message.text,
            author_id: message.author_id,
            author_name: message.author_name,
            channel_id: message.channel_id,
            thread_id: message.thread_id,
            message_id: message.message_id,
            created_at: Utc::now(),
        };
        inner.messages.push(stored.clone());
        if let Some(ticket) = inner
            .tickets
            .iter_mut()
            .find(|t| t.id == message.ticket_id)
        {
            ticket.message_count += 1;
            ticket.updated_at = Utc::now();
        }
        Ok(stored)
    }

    async fn for_ticket(&self, ticket_id: &str) -> Result<Vec<StoredMessage>, PipelineError> {
        let inner = self.inner.lock().unwrap();
        let mut messages: Vec<StoredMessage> = inner
            .messages
            .iter()
            .filter(|m| m.ticket_id == ticket_id)
            .cloned()
            .collect();
        messages.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(messages)
    }
}

#[async_trait]
impl TicketStore for MemoryStore {
    async fn find_by_anchor(
        &self,
        anchor_id: &str,
        channel_id: &str,
        status: TicketStatus,
    ) -> Result<Option<Ticket>, PipelineError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .tickets
            .iter()
            .find(|t| {
                t.anchor_id == anchor_id && t.channel_id == channel_id && t.status == status
            })
            .cloned())
    }

    async fn find_recent(
        &self,
        channel_id: &str,
        hours: i64,
        limit: usize,
    ) -> Result<Vec<Ticket>, PipelineError> {
        let cutoff = Utc::now() - Duration::hours(hours);
        let inner = self.inner.lock().unwrap();
        let mut recent: Vec<Ticket> = inner
            .tickets
            .iter()
            .filter(|t| {
                t.channel_id == channel_id
                    && t.status == TicketStatus::Open
                    && t.updated_at >= cutoff
            })
            .cloned()
            .collect();
        recent.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        recent.truncate(limit);
        Ok(recent)
    }

    async fn find_similar(
        &self,
        query: SimilarityQuery<'_>,
    ) -> Result<Vec<SimilarTicket>, PipelineError> {
        let cutoff = Utc::now() - Duration::minutes(query.time_window_minutes);
        let inner = self.inner.lock().unwrap();
        let mut matches: Vec<SimilarTicket> = inner
            .tickets
            .iter()
            .filter(|t| {
                t.channel_id == query.channel_id
                    && t.status == TicketStatus::Open
                    && t.updated_at >= cutoff
            })
            .filter_map(|t| {
                let embedding = inner.embeddings.get(&t.id)?;
                let similarity = cosine(query.embedding, embedding);
                (similarity >= query.similarity_threshold).then(|| SimilarTicket {
                    ticket: t.clone(),
                    similarity,
                })
            })
            .collect();
        matches.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap());
        matches.truncate(query.max_results);
        Ok(matches)
    }

    async fn insert(&self, ticket: NewTicket) -> Result<Ticket, PipelineError> {
        let now = Utc::now();
        let stored = Ticket {
            id: Uuid::new_v4().to_string(),
            title: ticket.title,
            category: ticket.category,
            status: ticket.status,
            channel_id: ticket.channel_id,
            anchor_id: ticket.anchor_id,
            display_name: None,
            last_author_name: None,
            message_count: 0,
            created_at: now,
            updated_at: now,
        };
        let mut inner = self.inner.lock().unwrap();
        inner.embeddings.insert(stored.id.clone(), ticket.embedding);
        inner.tickets.push(stored.clone());
        Ok(stored)
    }

    async fn update(
        &self,
        ticket_id: &str,
        update: TicketUpdate,
    ) -> Result<Ticket, PipelineError> {
        let mut inner = self.inner.lock().unwrap();
        let ticket = inner
            .tickets
            .iter_mut()
            .find(|t| t.id == ticket_id)
            .ok_or_else(|| PipelineError::Storage(format!("ticket {ticket_id} not found")))?;
        if let Some(title) = update.title {
            ticket.title = title;
        }
        if let Some(status) = update.status {
            ticket.status = status;
        }
        if let Some(display_name) = update.display_name {
            ticket.display_name = Some(display_name);
        }
        if let Some(last_author_name) = update.last_author_name {
            ticket.last_author_name = Some(last_author_name);
        }
        ticket.updated_at = Utc::now();
        Ok(ticket.clone())
    }

    async fn list_with_messages(
        &self,
        limit: usize,
    ) -> Result<Vec<TicketWithMessages>, PipelineError> {
        let inner = self.inner.lock().unwrap();
        let mut tickets = inner.tickets.clone();
        tickets.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        tickets.truncate(limit);
        Ok(tickets
            .into_iter()
            .map(|ticket| {
                let messages = inner
                    .messages
                    .iter()
                    .filter(|m| m.ticket_id == ticket.id)
                    .cloned()
                    .collect();
                TicketWithMessages { ticket, messages }
            })
            .collect())
    }
}

#[async_trait]
impl HistoryStore for MemoryStore {
    async fn append(&self, entry: NewHistoryEntry) -> Result<(), PipelineError> {
        self.inner.lock().unwrap().history.push(entry);
        Ok(())
    }
}

pub struct FakeClassifier(pub Classification);

impl FakeClassifier {
    pub fn relevant(category: Category) -> Self {
        Self(Classification {
            is_relevant: true,
            category: Some(category),
            confidence: 0.9,
            reasoning: "fixture".to_string(),
        })
    }

    /// The fail-closed default the real classifier produces on a fault.
    pub fn fault() -> Self {
        Self(Classification::not_relevant(
            "classification failed: simulated outage",
        ))
    }
}

#[async_trait]
impl Classify for FakeClassifier {
    async fn classify(&self, _text: &str) -> Classification {
        self.0.clone()
    }
}

#[derive(Default)]
pub struct FakeEmbedder {
    pub default: Vec<f32>,
    pub by_text: HashMap<String, Vec<f32>>,
    pub fail: bool,
}

impl FakeEmbedder {
    pub fn fixed(default: Vec<f32>) -> Self {
        Self {
            default,
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn with(mut self, text: &str, embedding: Vec<f32>) -> Self {
        self.by_text.insert(text.to_string(), embedding);
        self
    }
}

#[async_trait]
impl Embed for FakeEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, PipelineError> {
        if self.fail {
            return Err(PipelineError::Transient("embedding service down".into()));
        }
        Ok(self
            .by_text
            .get(text)
            .cloned()
            .unwrap_or_else(|| self.default.clone()))
    }
}

pub struct FakeJudge {
    verdict: SameIssueJudgment,
    pub calls: AtomicUsize,
}

impl FakeJudge {
    pub fn no_match() -> Self {
        Self {
            verdict: SameIssueJudgment::no_match("fixture"),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn matching(confidence: f64) -> Self {
        Self {
            verdict: SameIssueJudgment {
                is_same_issue: true,
                confidence,
                reasoning: "fixture".to_string(),
            },
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JudgeSameIssue for FakeJudge {
    async fn same_issue(
        &self,
        _message: &str,
        _anchor: &str,
        _ticket_title: Option<&str>,
    ) -> SameIssueJudgment {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.verdict.clone()
    }
}

/// Deterministic title source: titles derive from the newest message, so a
/// ticket that grows gets a different title without any model call.
pub struct FakeTitles;

#[async_trait]
impl ComposeTitle for FakeTitles {
    async fn compose(&self, messages: &[String], _category: Category) -> String {
        match messages.len() {
            0 => fallback_title(messages),
            n => fallback_title(&messages[n - 1..]),
        }
    }
}

pub struct FakeDirectory {
    pub author: Option<String>,
    pub channel: Option<String>,
}

impl FakeDirectory {
    pub fn named(author: &str, channel: &str) -> Self {
        Self {
            author: Some(author.to_string()),
            channel: Some(channel.to_string()),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            author: None,
            channel: None,
        }
    }
}

#[async_trait]
impl NameDirectory for FakeDirectory {
    async fn author_name(&self, _author_id: &str) -> Option<String> {
        self.author.clone()
    }

    async fn channel_name(&self, _channel_id: &str) -> Option<String> {
        self.channel.clone()
    }
}

pub fn open_ticket(
    id: &str,
    channel_id: &str,
    anchor_id: &str,
    category: Category,
    title: &str,
    age_minutes: i64,
) -> Ticket {
    let stamp = Utc::now() - Duration::minutes(age_minutes);
    Ticket {
        id: id.to_string(),
        title: title.to_string(),
        category,
        status: TicketStatus::Open,
        channel_id: channel_id.to_string(),
        anchor_id: anchor_id.to_string(),
        display_name: None,
        last_author_name: None,
        message_count: 0,
        created_at: stamp,
        updated_at: stamp,
    }
}

pub fn resolver_over(
    store: &Arc<MemoryStore>,
    judge: Arc<dyn JudgeSameIssue>,
) -> GroupingResolver {
    GroupingResolver::new(
        store.clone(),
        store.clone(),
        store.clone(),
        judge,
        Arc::new(FakeTitles),
        GroupingConfig::default(),
    )
}

pub fn pipeline_over(
    store: &Arc<MemoryStore>,
    classifier: Arc<dyn Classify>,
    embedder: Arc<dyn Embed>,
    judge: Arc<dyn JudgeSameIssue>,
    directory: Arc<dyn NameDirectory>,
) -> Pipeline {
    let resolver = resolver_over(store, judge);
    Pipeline::new(
        classifier,
        embedder,
        resolver,
        directory,
        store.clone(),
        store.clone(),
        store.clone(),
        Arc::new(FakeTitles),
    )
}

pub fn event(channel_id: &str, message_id: &str, text: &str) -> triage::schema::InboundEvent {
    triage::schema::InboundEvent {
        channel_id: channel_id.to_string(),
        thread_id: None,
        message_id: message_id.to_string(),
        author_id: "u-100".to_string(),
        text: text.to_string(),
    }
}
