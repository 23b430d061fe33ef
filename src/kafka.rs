//! Event-transport adapter: consumes raw chat events from Kafka and feeds
//! the processing pipeline, one spawned task per event.

use std::sync::Arc;

use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::{ClientConfig, Message};
use tracing::{debug, error, info};

use crate::config::Config;
use crate::error::PipelineError;
use crate::metrics::{
    EVENTS_RECEIVED, MESSAGES_DEDUPED, MESSAGES_FAILED, MESSAGES_INVALID, MESSAGES_IRRELEVANT,
    MESSAGES_PROCESSED,
};
use crate::pipeline::{Outcome, Pipeline};
use crate::schema::InboundEvent;

pub const CHAT_EVENTS_TOPIC: &str = "chat-events";

pub struct EventConsumer {
    consumer: StreamConsumer,
    pipeline: Arc<Pipeline>,
}

impl EventConsumer {
    pub fn new(cfg: &Config, pipeline: Arc<Pipeline>) -> Result<Self, PipelineError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("group.id", &cfg.kafka_group_id)
            .set("bootstrap.servers", &cfg.kafka_brokers)
            .set("enable.partition.eof", "false")
            .set("session.timeout.ms", "30000")
            .set("enable.auto.commit", "true")
            .set("auto.commit.interval.ms", "5000")
            .set("auto.offset.reset", "earliest")
            .set("max.poll.interval.ms", "600000") // 10 minutes
            .set("heartbeat.interval.ms", "10000") // 10 seconds
            .create()
            .map_err(|e| PipelineError::Transient(e.to_string()))?;

        Ok(Self { consumer, pipeline })
    }

    pub fn subscribe(&self) -> Result<(), PipelineError> {
        self.consumer
            .subscribe(&[CHAT_EVENTS_TOPIC])
            .map_err(|e| PipelineError::Transient(e.to_string()))?;
        info!(topic = CHAT_EVENTS_TOPIC, "Subscribed to Kafka topic");
        Ok(())
    }

    /// Consume forever. Auto-commit plus the dedup check give at-least-once
    /// semantics: a failed event is redelivered and retried whole, a
    /// replayed event is recognized by its identity key and skipped.
    pub async fn run(&self) -> Result<(), PipelineError> {
        info!("Starting event consumer...");

        loop {
            let (payload, topic, partition, offset) = {
                let message = match self.consumer.recv().await {
                    Ok(msg) => msg,
                    Err(e) => {
                        error!(error = %e, "Error receiving message from Kafka");
                        continue;
                    }
                };

                if let Some(payload) = message.payload() {
                    let topic = message.topic().to_string();
                    let partition = message.partition();
                    let offset = message.offset();
                    (payload.to_vec(), topic, partition, offset)
                } else {
                    continue;
                }
            };

            EVENTS_RECEIVED.inc();
            let event: InboundEvent = match serde_json::from_slice(&payload) {
                Ok(event) => event,
                Err(err) => {
                    // Structurally broken payloads cannot succeed on retry.
                    MESSAGES_INVALID.inc();
                    error!(error = %err, topic = %topic, "Dropping undecodable event");
                    continue;
                }
            };

            let pipeline = self.pipeline.clone();
            tokio::spawn(async move {
                match pipeline.process(event).await {
                    Ok(Outcome::Processed { ticket_id }) => {
                        MESSAGES_PROCESSED.inc();
                        debug!(
                            topic = %topic,
                            partition = partition,
                            offset = offset,
                            ticket_id = %ticket_id,
                            "Processed event"
                        );
                    }
                    Ok(Outcome::Duplicate) => {
                        MESSAGES_DEDUPED.inc();
                    }
                    Ok(Outcome::Irrelevant) => {
                        MESSAGES_IRRELEVANT.inc();
                    }
                    Ok(Outcome::Invalid) => {
                        MESSAGES_INVALID.inc();
                    }
                    Err(err) => {
                        MESSAGES_FAILED.inc();
                        error!(error = %err, topic = %topic, "Failed to process event");
                    }
                }
            });
        }
    }
}
