//! Secondary-Intent Relay
//!
//! When a message carries no track link but reads like a trading or wallet
//! question, the agent forwards it to an external prompt-answering service
//! and polls for the result. The intent check is a keyword heuristic, not a
//! parser; occasional false positives and negatives are expected.

use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use tokio::time::{sleep, Duration};

/// Keywords that mark a message as a trading/wallet question.
const INTENT_KEYWORDS: &[&str] = &[
    "balance",
    "trade",
    "transfer",
    "swap",
    "price",
    "buy",
    "sell",
    "portfolio",
    "holdings",
    "market",
    "wallet",
    "usdc",
];

/// Interval between job status polls.
const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Maximum status polls before giving up on a job.
const MAX_POLL_ATTEMPTS: u32 = 30;

/// Case-insensitive keyword screen for trading/wallet intent.
pub fn looks_like_intent(text: &str) -> bool {
    let lower = text.to_lowercase();
    INTENT_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Result of one submit-and-poll cycle against the relay service.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RelayOutcome {
    Completed(String),
    Failed(String),
    TimedOut,
}

impl RelayOutcome {
    /// Render the outcome as the user-facing reply text.
    pub fn into_reply(self) -> String {
        match self {
            RelayOutcome::Completed(text) => text,
            RelayOutcome::Failed(reason) => {
                format!("❌ The assistant could not process that request: {}", reason)
            }
            RelayOutcome::TimedOut => {
                "⏳ The assistant took too long to respond. Please try again.".to_string()
            }
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitResponse {
    job_id: String,
}

#[derive(Debug, Deserialize)]
struct JobStatus {
    #[serde(default)]
    status: String,
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Map one polled job status onto the loop decision: `Some` for a terminal
/// state (stop polling), `None` to keep waiting.
fn job_outcome(job: &JobStatus) -> Option<RelayOutcome> {
    match job.status.as_str() {
        "completed" => Some(RelayOutcome::Completed(
            job.response.clone().unwrap_or_default(),
        )),
        "failed" | "cancelled" => Some(RelayOutcome::Failed(
            job.error.clone().unwrap_or_else(|| job.status.clone()),
        )),
        _ => None,
    }
}

/// Client for the asynchronous prompt-answering relay.
pub struct RelayClient {
    api_url: String,
    http: Client,
}

impl RelayClient {
    pub fn new(api_url: String) -> Self {
        Self {
            api_url,
            http: Client::new(),
        }
    }

    /// Submit a prompt and poll its job until a terminal state or the
    /// attempt budget runs out. This is the only retry loop outside the
    /// mint payment handshake.
    pub async fn submit_and_await(&self, prompt: &str) -> Result<RelayOutcome> {
        let url = format!("{}/agent/prompt", self.api_url);
        let response = self
            .http
            .post(&url)
            .json(&serde_json::json!({ "prompt": prompt }))
            .send()
            .await
            .context("Failed to submit prompt to the relay service")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Relay returned {}: {}", status, body);
        }

        let submitted: SubmitResponse = response
            .json()
            .await
            .context("Failed to parse relay submit response")?;

        for _ in 0..MAX_POLL_ATTEMPTS {
            sleep(POLL_INTERVAL).await;

            let status_url = format!("{}/agent/job/{}", self.api_url, submitted.job_id);
            let job: JobStatus = self
                .http
                .get(&status_url)
                .send()
                .await
                .context("Failed to poll relay job status")?
                .json()
                .await
                .context("Failed to parse relay job status")?;

            if let Some(outcome) = job_outcome(&job) {
                return Ok(outcome);
            }
        }

        Ok(RelayOutcome::TimedOut)
    }
}
