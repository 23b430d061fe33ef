//! Embedding generation for semantic similarity.

use async_trait::async_trait;
use tracing::debug;

use crate::error::PipelineError;
use crate::metrics::EMBEDDING_GENERATION_DURATION;
use crate::openai::{truncate_for_model, OpenAiClient};

#[async_trait]
pub trait Embed: Send + Sync {
    /// Embed one text. Faults are propagated, not defaulted: a ticket created
    /// or matched with a bogus vector would corrupt the similarity index for
    /// every future grouping decision.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, PipelineError>;
}

pub struct Embedder {
    ai: OpenAiClient,
    model: String,
}

impl Embedder {
    pub fn new(ai: OpenAiClient, model: impl Into<String>) -> Self {
        Self {
            ai,
            model: model.into(),
        }
    }
}

#[async_trait]
impl Embed for Embedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, PipelineError> {
        let _timer = EMBEDDING_GENERATION_DURATION.start_timer();
        let text = truncate_for_model(text);
        let emb = self.ai.embed(&self.model, &text).await?;
        debug!(len = emb.len(), "Generated embedding");
        Ok(emb)
    }
}
