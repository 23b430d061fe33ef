//! Idempotency-key check against already-stored messages.

use std::sync::Arc;

use tracing::{error, info};

use crate::store::MessageStore;

pub struct DeduplicationChecker {
    messages: Arc<dyn MessageStore>,
}

impl DeduplicationChecker {
    pub fn new(messages: Arc<dyn MessageStore>) -> Self {
        Self { messages }
    }

    /// True if a message with this identity key was already stored.
    ///
    /// A lookup fault answers `false` (fail-open): reprocessing a message is
    /// recoverable downstream through the identity key's uniqueness, while
    /// skipping one drops it for good.
    pub async fn seen(&self, event_key: &str) -> bool {
        match self.messages.find_by_event_key(event_key).await {
            Ok(Some(_)) => {
                info!(event_key = %event_key, "Message already processed");
                true
            }
            Ok(None) => false,
            Err(err) => {
                error!(error = %err, event_key = %event_key, "Dedup check failed, treating as unseen");
                false
            }
        }
    }
}
