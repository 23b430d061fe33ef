// Ingest service: consumes chat events from Kafka and resolves each into a
// ticket. Run with: cargo run --bin triage

use std::sync::Arc;

use dotenv::dotenv;
use tracing::info;

use triage::classifier::Classifier;
use triage::config::Config;
use triage::directory::RestDirectory;
use triage::embeddings::Embedder;
use triage::judge::GroupingJudge;
use triage::kafka::EventConsumer;
use triage::openai::OpenAiClient;
use triage::pipeline::Pipeline;
use triage::resolver::GroupingResolver;
use triage::store::{HistoryStore, MessageStore, TicketStore};
use triage::supabase::SupabaseStore;
use triage::title::TitleGenerator;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let cfg = Config::from_env();

    info!("Starting triage ingest service...");

    let store = Arc::new(SupabaseStore::new(&cfg));
    let tickets: Arc<dyn TicketStore> = store.clone();
    let messages: Arc<dyn MessageStore> = store.clone();
    let history: Arc<dyn HistoryStore> = store;

    let ai = OpenAiClient::new(&cfg);
    let classifier = Arc::new(Classifier::new(ai.clone(), &cfg.classifier_model));
    let embedder = Arc::new(Embedder::new(ai.clone(), &cfg.embedding_model));
    let judge = Arc::new(GroupingJudge::new(ai.clone(), &cfg.judgment_model));
    let titles = Arc::new(TitleGenerator::new(ai, &cfg.title_model));

    let resolver = GroupingResolver::new(
        tickets.clone(),
        messages.clone(),
        history.clone(),
        judge,
        titles.clone(),
        cfg.grouping,
    );

    let directory = Arc::new(RestDirectory::new(&cfg));
    let pipeline = Arc::new(Pipeline::new(
        classifier, embedder, resolver, directory, tickets, messages, history, titles,
    ));

    let consumer = EventConsumer::new(&cfg, pipeline)?;
    consumer.subscribe()?;
    consumer.run().await?;

    Ok(())
}
