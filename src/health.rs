use std::collections::HashMap;

use crate::config::Config;

#[derive(Debug, Clone, serde::Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: String,
    pub services: HashMap<String, ServiceHealth>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ServiceHealth {
    pub status: String,
    pub message: Option<String>,
    pub response_time_ms: Option<u64>,
}

impl ServiceHealth {
    fn healthy(message: impl Into<String>, elapsed_ms: u64) -> Self {
        Self {
            status: "healthy".to_string(),
            message: Some(message.into()),
            response_time_ms: Some(elapsed_ms),
        }
    }

    fn unhealthy(message: impl Into<String>, elapsed_ms: u64) -> Self {
        Self {
            status: "unhealthy".to_string(),
            message: Some(message.into()),
            response_time_ms: Some(elapsed_ms),
        }
    }
}

pub struct HealthChecker {
    client: reqwest::Client,
}

impl HealthChecker {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    pub async fn check_kafka(&self, cfg: &Config) -> ServiceHealth {
        let start = std::time::Instant::now();

        use rdkafka::client::DefaultClientContext;
        use rdkafka::config::FromClientConfig;
        let mut client_config = rdkafka::ClientConfig::new();
        client_config.set("bootstrap.servers", &cfg.kafka_brokers);
        match rdkafka::producer::FutureProducer::<DefaultClientContext, rdkafka::util::TokioRuntime>::from_config(&client_config)
        {
            Ok(_) => ServiceHealth::healthy(
                "Kafka producer created successfully",
                start.elapsed().as_millis() as u64,
            ),
            Err(e) => ServiceHealth::unhealthy(
                format!("Kafka error: {}", e),
                start.elapsed().as_millis() as u64,
            ),
        }
    }

    pub async fn check_store(&self, cfg: &Config) -> ServiceHealth {
        let start = std::time::Instant::now();
        let url = format!("{}/rest/v1/", cfg.supabase_url.trim_end_matches('/'));

        match self
            .client
            .get(&url)
            .header("apikey", &cfg.supabase_key)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => ServiceHealth::healthy(
                "Supabase REST API accessible",
                start.elapsed().as_millis() as u64,
            ),
            Ok(response) => ServiceHealth::unhealthy(
                format!("Supabase returned status: {}", response.status()),
                start.elapsed().as_millis() as u64,
            ),
            Err(e) => ServiceHealth::unhealthy(
                format!("Supabase connection error: {}", e),
                start.elapsed().as_millis() as u64,
            ),
        }
    }

    pub async fn check_openai(&self, cfg: &Config) -> ServiceHealth {
        let start = std::time::Instant::now();
        let url = format!("{}/v1/models", cfg.openai_base_url.trim_end_matches('/'));

        match self
            .client
            .get(&url)
            .bearer_auth(&cfg.openai_key)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => {
                ServiceHealth::healthy("OpenAI API accessible", start.elapsed().as_millis() as u64)
            }
            Ok(response) => ServiceHealth::unhealthy(
                format!("OpenAI returned status: {}", response.status()),
                start.elapsed().as_millis() as u64,
            ),
            Err(e) => ServiceHealth::unhealthy(
                format!("OpenAI connection error: {}", e),
                start.elapsed().as_millis() as u64,
            ),
        }
    }

    pub async fn get_overall_health(&self, cfg: &Config) -> HealthStatus {
        let mut services = HashMap::new();

        services.insert("kafka".to_string(), self.check_kafka(cfg).await);
        services.insert("supabase".to_string(), self.check_store(cfg).await);
        services.insert("openai".to_string(), self.check_openai(cfg).await);

        let all_healthy = services.values().all(|service| service.status == "healthy");
        let overall_status = if all_healthy { "healthy" } else { "degraded" };

        HealthStatus {
            status: overall_status.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            services,
        }
    }
}

impl Default for HealthChecker {
    fn default() -> Self {
        Self::new()
    }
}
