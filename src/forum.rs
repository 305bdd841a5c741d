//! Forum Cross-Posting
//!
//! Posts mint announcements to an external forum board. Used only as a
//! best-effort fan-out leg: the caller logs and swallows every failure.

use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::Value;

use crate::config::ForumConfig;

/// Bearer-authenticated forum client.
pub struct ForumClient {
    api_url: String,
    api_key: String,
    board: String,
    http: Client,
}

impl ForumClient {
    pub fn new(config: &ForumConfig) -> Self {
        Self {
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            board: config.board.clone(),
            http: Client::new(),
        }
    }

    /// Create a post on the configured board.
    ///
    /// The forum rate-limits externally (HTTP 429, one post per 30 minutes);
    /// a 429 is surfaced with that hint so the fan-out log explains itself.
    pub async fn post(&self, title: &str, content: &str) -> Result<()> {
        let url = format!("{}/posts", self.api_url);
        let body = serde_json::json!({
            "board": self.board,
            "title": title,
            "content": content,
        });

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .context("Failed to reach the forum API")?;

        let status = response.status();
        if status.as_u16() == 429 {
            anyhow::bail!("Forum rate limit hit (1 post per 30 minutes)");
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|v| {
                    v["error"]
                        .as_str()
                        .or_else(|| v["hint"].as_str())
                        .map(|s| s.to_string())
                })
                .unwrap_or(text);
            anyhow::bail!("Forum post failed ({}): {}", status.as_u16(), detail);
        }

        Ok(())
    }
}
