//! Messaging Gateway Client
//!
//! HTTP client for the messaging-network gateway. The gateway owns the
//! network session and keys; this client only polls it for inbound text
//! events and posts outbound sends (text, reactions, and structured
//! content with the copy-suggestion content type).

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::suggestion::{CopySuggestion, CopySuggestionCodec};
use crate::types::{ConversationKind, InboundMessage, Messaging};

/// Gateway client. Cheap to clone; clones share the underlying connection
/// pool.
#[derive(Clone)]
pub struct GatewayClient {
    gateway_url: String,
    http: Client,
}

// ─── Wire shapes ─────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct EventsResponse {
    #[serde(default)]
    events: Vec<TextEvent>,
    #[serde(default)]
    cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TextEvent {
    id: String,
    content: String,
    sender_id: String,
    conversation: ConversationRef,
}

#[derive(Debug, Deserialize)]
struct ConversationRef {
    id: String,
    kind: ConversationKind,
}

impl From<TextEvent> for InboundMessage {
    fn from(event: TextEvent) -> Self {
        InboundMessage {
            id: event.id,
            text: event.content,
            sender_id: event.sender_id,
            conversation_id: event.conversation.id,
            conversation_kind: event.conversation.kind,
        }
    }
}

// ─── Client ──────────────────────────────────────────────────────

impl GatewayClient {
    pub fn new(gateway_url: String) -> Self {
        Self {
            gateway_url,
            http: Client::new(),
        }
    }

    /// Poll the gateway for new text events.
    ///
    /// `cursor` is an opaque pagination token from a previous poll; pass
    /// `None` on the first call. Returns the new messages and the cursor to
    /// resume from.
    pub async fn poll_events(
        &self,
        cursor: Option<&str>,
    ) -> Result<(Vec<InboundMessage>, Option<String>)> {
        let mut url = format!("{}/events", self.gateway_url);
        if let Some(c) = cursor {
            url.push_str(&format!("?cursor={}", urlencoding::encode(c)));
        }

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .context("Failed to poll the messaging gateway for events")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Gateway returned {}: {}", status, body);
        }

        let parsed: EventsResponse = response
            .json()
            .await
            .context("Failed to parse gateway events response")?;

        let messages = parsed.events.into_iter().map(InboundMessage::from).collect();
        Ok((messages, parsed.cursor))
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> Result<()> {
        let url = format!("{}{}", self.gateway_url, path);
        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Failed to reach the messaging gateway: POST {}", path))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("Gateway returned {}: {}", status, text);
        }
        Ok(())
    }
}

#[async_trait]
impl Messaging for GatewayClient {
    async fn send_text(&self, conversation_id: &str, text: &str) -> Result<()> {
        self.post(
            &format!("/conversations/{}/text", conversation_id),
            serde_json::json!({ "text": text }),
        )
        .await
    }

    async fn send_reaction(
        &self,
        conversation_id: &str,
        message_id: &str,
        emoji: &str,
    ) -> Result<()> {
        self.post(
            &format!("/conversations/{}/reaction", conversation_id),
            serde_json::json!({ "referenceId": message_id, "emoji": emoji }),
        )
        .await
    }

    async fn send_suggestion(
        &self,
        conversation_id: &str,
        suggestion: &CopySuggestion,
    ) -> Result<()> {
        let codec = CopySuggestionCodec;
        self.post(
            &format!("/conversations/{}/content", conversation_id),
            serde_json::json!({
                "contentType": codec.content_type(),
                "content": suggestion,
                "fallback": codec.fallback(suggestion),
            }),
        )
        .await
    }
}
