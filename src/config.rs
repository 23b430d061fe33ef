use std::env;

/// Runtime configuration, read once at startup and handed to each component
/// at construction.
#[derive(Clone)]
pub struct Config {
    pub openai_key: String,
    pub openai_base_url: String,
    pub supabase_url: String,
    pub supabase_key: String,
    pub directory_base_url: String,
    pub kafka_brokers: String,
    pub kafka_group_id: String,

    pub classifier_model: String,
    pub judgment_model: String,
    pub title_model: String,
    pub embedding_model: String,

    pub grouping: GroupingConfig,
}

/// Thresholds and windows for the grouping resolver.
#[derive(Debug, Clone, Copy)]
pub struct GroupingConfig {
    /// Minimum cosine similarity for a vector-search candidate.
    pub similarity_threshold: f64,
    /// Above this cutoff a candidate is accepted even on category mismatch.
    pub high_confidence_threshold: f64,
    /// Recency window for the vector search, in minutes.
    pub time_window_minutes: i64,
    pub similarity_max_results: usize,
    /// Lookback for pairwise-judgment candidates, in hours.
    pub judgment_lookback_hours: i64,
    pub judgment_candidate_limit: usize,
    /// Minimum judge confidence for a positive pairwise verdict to stick.
    pub judgment_confidence_threshold: f64,
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.75,
            high_confidence_threshold: 0.86,
            time_window_minutes: 60,
            similarity_max_results: 5,
            judgment_lookback_hours: 24,
            judgment_candidate_limit: 10,
            judgment_confidence_threshold: 0.70,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = GroupingConfig::default();
        Self {
            openai_key: env::var("OPENAI_API_KEY")
                .expect("Expected OPENAI_API_KEY in env"),
            openai_base_url: env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com".into()),
            supabase_url: env::var("SUPABASE_URL")
                .expect("Expected SUPABASE_URL in env"),
            supabase_key: env::var("SUPABASE_KEY")
                .expect("Expected SUPABASE_KEY in env"),
            directory_base_url: env::var("DIRECTORY_BASE_URL")
                .expect("Expected DIRECTORY_BASE_URL in env"),
            kafka_brokers: env::var("KAFKA_BROKERS")
                .unwrap_or_else(|_| "localhost:9092".into()),
            kafka_group_id: env::var("KAFKA_GROUP_ID")
                .unwrap_or_else(|_| "triage-pipeline".into()),

            classifier_model: env::var("CLASSIFIER_MODEL")
                .unwrap_or_else(|_| "gpt-4o".into()),
            judgment_model: env::var("JUDGMENT_MODEL")
                .unwrap_or_else(|_| "gpt-4o-mini".into()),
            title_model: env::var("TITLE_MODEL")
                .unwrap_or_else(|_| "gpt-4o-mini".into()),
            embedding_model: env::var("EMBEDDING_MODEL")
                .unwrap_or_else(|_| "text-embedding-3-small".into()),

            grouping: GroupingConfig {
                similarity_threshold: env_or("SIMILARITY_THRESHOLD", defaults.similarity_threshold),
                high_confidence_threshold: env_or(
                    "HIGH_CONFIDENCE_THRESHOLD",
                    defaults.high_confidence_threshold,
                ),
                time_window_minutes: env_or("TIME_WINDOW_MINUTES", defaults.time_window_minutes),
                similarity_max_results: env_or(
                    "SIMILARITY_MAX_RESULTS",
                    defaults.similarity_max_results,
                ),
                judgment_lookback_hours: env_or(
                    "JUDGMENT_LOOKBACK_HOURS",
                    defaults.judgment_lookback_hours,
                ),
                judgment_candidate_limit: env_or(
                    "JUDGMENT_CANDIDATE_LIMIT",
                    defaults.judgment_candidate_limit,
                ),
                judgment_confidence_threshold: env_or(
                    "JUDGMENT_CONFIDENCE_THRESHOLD",
                    defaults.judgment_confidence_threshold,
                ),
            },
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}
