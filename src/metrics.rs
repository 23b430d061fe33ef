use prometheus::{Counter, Histogram, HistogramOpts, Opts, Registry, TextEncoder};
use tracing::error;

lazy_static::lazy_static! {
    // Event outcome counters
    pub static ref EVENTS_RECEIVED: Counter = Counter::with_opts(
        Opts::new("triage_events_received_total", "Total number of events received from the transport")
    ).unwrap();

    pub static ref MESSAGES_PROCESSED: Counter = Counter::with_opts(
        Opts::new("triage_messages_processed_total", "Total number of messages resolved into a ticket")
    ).unwrap();

    pub static ref MESSAGES_FAILED: Counter = Counter::with_opts(
        Opts::new("triage_messages_failed_total", "Total number of messages that failed processing")
    ).unwrap();

    pub static ref MESSAGES_DEDUPED: Counter = Counter::with_opts(
        Opts::new("triage_messages_deduped_total", "Total number of messages skipped as already processed")
    ).unwrap();

    pub static ref MESSAGES_IRRELEVANT: Counter = Counter::with_opts(
        Opts::new("triage_messages_irrelevant_total", "Total number of messages classified as not relevant")
    ).unwrap();

    pub static ref MESSAGES_INVALID: Counter = Counter::with_opts(
        Opts::new("triage_messages_invalid_total", "Total number of events dropped for missing required fields")
    ).unwrap();

    pub static ref TICKETS_CREATED: Counter = Counter::with_opts(
        Opts::new("triage_tickets_created_total", "Total number of tickets created")
    ).unwrap();

    pub static ref TICKETS_MERGED: Counter = Counter::with_opts(
        Opts::new("triage_tickets_merged_total", "Total number of racing duplicate tickets merged away")
    ).unwrap();

    pub static ref SLA_BREACHES: Counter = Counter::with_opts(
        Opts::new("triage_sla_breaches_total", "Total number of events processed slower than the 8s soft target")
    ).unwrap();

    // Latency metrics
    pub static ref PIPELINE_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new("triage_pipeline_duration_seconds", "Time spent processing one event end to end")
    ).unwrap();

    pub static ref CLASSIFICATION_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new("triage_classification_duration_seconds", "Time spent classifying messages")
    ).unwrap();

    pub static ref EMBEDDING_GENERATION_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new("triage_embedding_generation_duration_seconds", "Time spent generating embeddings")
    ).unwrap();

    pub static ref GROUPING_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new("triage_grouping_duration_seconds", "Time spent resolving a message to a ticket")
    ).unwrap();

    pub static ref TITLE_GENERATION_DURATION: Histogram = Histogram::with_opts(
        HistogramOpts::new("triage_title_generation_duration_seconds", "Time spent composing ticket titles")
    ).unwrap();
}

pub struct MetricsRegistry {
    registry: Registry,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        let registry = Registry::new();

        registry.register(Box::new(EVENTS_RECEIVED.clone())).unwrap();
        registry.register(Box::new(MESSAGES_PROCESSED.clone())).unwrap();
        registry.register(Box::new(MESSAGES_FAILED.clone())).unwrap();
        registry.register(Box::new(MESSAGES_DEDUPED.clone())).unwrap();
        registry.register(Box::new(MESSAGES_IRRELEVANT.clone())).unwrap();
        registry.register(Box::new(MESSAGES_INVALID.clone())).unwrap();
        registry.register(Box::new(TICKETS_CREATED.clone())).unwrap();
        registry.register(Box::new(TICKETS_MERGED.clone())).unwrap();
        registry.register(Box::new(SLA_BREACHES.clone())).unwrap();
        registry.register(Box::new(PIPELINE_DURATION.clone())).unwrap();
        registry.register(Box::new(CLASSIFICATION_DURATION.clone())).unwrap();
        registry.register(Box::new(EMBEDDING_GENERATION_DURATION.clone())).unwrap();
        registry.register(Box::new(GROUPING_DURATION.clone())).unwrap();
        registry.register(Box::new(TITLE_GENERATION_DURATION.clone())).unwrap();

        Self { registry }
    }

    pub fn gather_metrics(&self) -> String {
        let metric_families = self.registry.gather();
        let encoder = TextEncoder::new();
        encoder.encode_to_string(&metric_families).unwrap_or_else(|e| {
            error!("Failed to encode metrics: {}", e);
            String::new()
        })
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}
