//! Display-name lookups against the chat platform's directory service.

use async_trait::async_trait;
use reqwest::Client;
use tracing::warn;

use crate::config::Config;

#[async_trait]
pub trait NameDirectory: Send + Sync {
    /// Display name for an author id; `None` on any fault.
    async fn author_name(&self, author_id: &str) -> Option<String>;

    /// Display name for a channel id; `None` on any fault.
    async fn channel_name(&self, channel_id: &str) -> Option<String>;
}

pub struct RestDirectory {
    client: Client,
    base_url: String,
}

impl RestDirectory {
    pub fn new(cfg: &Config) -> Self {
        Self {
            client: Client::new(),
            base_url: cfg.directory_base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn lookup(&self, path: &str, id: &str) -> Option<String> {
        let url = format!("{}/{}/{}", self.base_url, path, id);
        let res = match self.client.get(&url).send().await {
            Ok(res) if res.status().is_success() => res,
            Ok(res) => {
                warn!(url = %url, status = %res.status(), "Directory lookup failed");
                return None;
            }
            Err(err) => {
                warn!(url = %url, error = %err, "Directory lookup failed");
                return None;
            }
        };
        let body: serde_json::Value = res.json().await.ok()?;
        body["name"].as_str().map(|s| s.to_string())
    }
}

#[async_trait]
impl NameDirectory for RestDirectory {
    async fn author_name(&self, author_id: &str) -> Option<String> {
        self.lookup("users", author_id).await
    }

    async fn channel_name(&self, channel_id: &str) -> Option<String> {
        self.lookup("channels", channel_id).await.map(|name| {
            if name.starts_with('#') {
                name
            } else {
                format!("#{name}")
            }
        })
    }
}
