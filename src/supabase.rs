//! Supabase PostgREST adapter for the storage contracts.
//!
//! Plain REST filters for row lookups plus the `find_similar_tickets` RPC
//! for the pgvector nearest-neighbour search.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use reqwest::Client;
use serde_json::json;
use tracing::{debug, error};

use crate::config::Config;
use crate::error::PipelineError;
use crate::schema::{
    NewHistoryEntry, NewMessage, NewTicket, SimilarTicket, StoredMessage, Ticket, TicketStatus,
    TicketUpdate, TicketWithMessages,
};
use crate::store::{HistoryStore, MessageStore, SimilarityQuery, TicketStore};

/// Read-model columns; the embedding column stays server-side.
const TICKET_COLUMNS: &str = "id,title,category,status,channel_id,anchor_id,display_name,\
                              last_author_name,message_count,created_at,updated_at";

pub struct SupabaseStore {
    client: Client,
    base_url: String,
    api_key: String,
}

impl SupabaseStore {
    pub fn new(cfg: &Config) -> Self {
        Self {
            client: Client::new(),
            base_url: format!("{}/rest/v1", cfg.supabase_url.trim_end_matches('/')),
            api_key: cfg.supabase_key.clone(),
        }
    }

    fn get(&self, table: &str) -> reqwest::RequestBuilder {
        self.client
            .get(format!("{}/{}", self.base_url, table))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}/{}", self.base_url, path))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    fn patch(&self, table: &str) -> reqwest::RequestBuilder {
        self.client
            .patch(format!("{}/{}", self.base_url, table))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn read_rows<T: serde::de::DeserializeOwned>(
        &self,
        res: reqwest::Response,
        context: &str,
    ) -> Result<Vec<T>, PipelineError> {
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            error!(status = %status, body = %body, "{context} failed");
            return Err(PipelineError::Storage(format!("{context}: {status}")));
        }
        res.json::<Vec<T>>()
            .await
            .map_err(|e| PipelineError::Storage(format!("{context} decode: {e}")))
    }
}

fn status_filter(status: TicketStatus) -> &'static str {
    match status {
        TicketStatus::Open => "eq.open",
        TicketStatus::Closed => "eq.closed",
    }
}

#[async_trait]
impl MessageStore for SupabaseStore {
    async fn find_by_event_key(
        &self,
        event_key: &str,
    ) -> Result<Option<StoredMessage>, PipelineError> {
        let res = self
            .get("messages")
            .query(&[
                ("event_key", format!("eq.{event_key}")),
                ("limit", "1".into()),
            ])
            .send()
            .await
            .map_err(|e| PipelineError::Storage(e.to_string()))?;
        let rows: Vec<StoredMessage> = self.read_rows(res, "message lookup").await?;
        Ok(rows.into_iter().next())
    }

    async fn insert(&self, message: NewMessage) -> Result<StoredMessage, PipelineError> {
        let res = self
            .post("messages")
            .header("Prefer", "return=representation")
            .json(&message)
            .send()
            .await
            .map_err(|e| PipelineError::Storage(e.to_string()))?;
        let rows: Vec<StoredMessage> = self.read_rows(res, "message insert").await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| PipelineError::Storage("message insert returned no row".into()))
    }

    async fn for_ticket(&self, ticket_id: &str) -> Result<Vec<StoredMessage>, PipelineError> {
        let res = self
            .get("messages")
            .query(&[
                ("ticket_id", format!("eq.{ticket_id}")),
                ("order", "created_at.asc".into()),
            ])
            .send()
            .await
            .map_err(|e| PipelineError::Storage(e.to_string()))?;
        self.read_rows(res, "ticket messages").await
    }
}

#[async_trait]
impl TicketStore for SupabaseStore {
    async fn find_by_anchor(
        &self,
        anchor_id: &str,
        channel_id: &str,
        status: TicketStatus,
    ) -> Result<Option<Ticket>, PipelineError> {
        let res = self
            .get("tickets")
            .query(&[
                ("select", TICKET_COLUMNS.to_string()),
                ("anchor_id", format!("eq.{anchor_id}")),
                ("channel_id", format!("eq.{channel_id}")),
                ("status", status_filter(status).to_string()),
                ("limit", "1".into()),
            ])
            .send()
            .await
            .map_err(|e| PipelineError::Storage(e.to_string()))?;
        let rows: Vec<Ticket> = self.read_rows(res, "anchor lookup").await?;
        Ok(rows.into_iter().next())
    }

    async fn find_recent(
        &self,
        channel_id: &str,
        hours: i64,
        limit: usize,
    ) -> Result<Vec<Ticket>, PipelineError> {
        let cutoff = Utc::now() - Duration::hours(hours);
        let res = self
            .get("tickets")
            .query(&[
                ("select", TICKET_COLUMNS.to_string()),
                ("channel_id", format!("eq.{channel_id}")),
                ("status", "eq.open".into()),
                ("updated_at", format!("gte.{}", cutoff.to_rfc3339())),
                ("order", "updated_at.desc".into()),
                ("limit", limit.to_string()),
            ])
            .send()
            .await
            .map_err(|e| PipelineError::Storage(e.to_string()))?;
        self.read_rows(res, "recent tickets").await
    }

    async fn find_similar(
        &self,
        query: SimilarityQuery<'_>,
    ) -> Result<Vec<SimilarTicket>, PipelineError> {
        let res = self
            .post("rpc/find_similar_tickets")
            .json(&json!({
                "query_embedding": query.embedding,
                "similarity_threshold": query.similarity_threshold,
                "time_window_minutes": query.time_window_minutes,
                "channel_filter": query.channel_id,
                "max_results": query.max_results
            }))
            .send()
            .await
            .map_err(|e| PipelineError::Storage(e.to_string()))?;
        let rows: Vec<SimilarTicket> = self.read_rows(res, "similarity search").await?;
        debug!(count = rows.len(), "Similarity search returned candidates");
        Ok(rows)
    }

    async fn insert(&self, ticket: NewTicket) -> Result<Ticket, PipelineError> {
        let res = self
            .post("tickets")
            .header("Prefer", "return=representation")
            .query(&[("select", TICKET_COLUMNS)])
            .json(&ticket)
            .send()
            .await
            .map_err(|e| PipelineError::Storage(e.to_string()))?;
        let rows: Vec<Ticket> = self.read_rows(res, "ticket insert").await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| PipelineError::Storage("ticket insert returned no row".into()))
    }

    async fn update(
        &self,
        ticket_id: &str,
        update: TicketUpdate,
    ) -> Result<Ticket, PipelineError> {
        let res = self
            .patch("tickets")
            .header("Prefer", "return=representation")
            .query(&[
                ("select", TICKET_COLUMNS.to_string()),
                ("id", format!("eq.{ticket_id}")),
            ])
            .json(&update)
            .send()
            .await
            .map_err(|e| PipelineError::Storage(e.to_string()))?;
        let rows: Vec<Ticket> = self.read_rows(res, "ticket update").await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| PipelineError::Storage(format!("ticket {ticket_id} not found")))
    }

    async fn list_with_messages(
        &self,
        limit: usize,
    ) -> Result<Vec<TicketWithMessages>, PipelineError> {
        let res = self
            .get("tickets")
            .query(&[
                ("select", format!("{TICKET_COLUMNS},messages(*)")),
                ("order", "updated_at.desc".into()),
                ("limit", limit.to_string()),
            ])
            .send()
            .await
            .map_err(|e| PipelineError::Storage(e.to_string()))?;
        self.read_rows(res, "ticket listing").await
    }
}

#[async_trait]
impl HistoryStore for SupabaseStore {
    async fn append(&self, entry: NewHistoryEntry) -> Result<(), PipelineError> {
        let res = self
            .post("ticket_history")
            .header("Prefer", "return=minimal")
            .json(&entry)
            .send()
            .await
            .map_err(|e| PipelineError::Storage(e.to_string()))?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            error!(status = %status, body = %body, "history append failed");
            return Err(PipelineError::Storage(format!("history append: {status}")));
        }
        Ok(())
    }
}
