//! SongCast Agent - Type Definitions
//!
//! Shared types for the tokenizer agent: inbound message shape, catalog
//! track metadata, coin records, the x402 payment challenge, and the trait
//! seams for the messaging transport and the SongCast backend.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::suggestion::CopySuggestion;

// ─── Messaging ───────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConversationKind {
    Direct,
    Group,
}

/// One inbound text event from the messaging network. Created per received
/// event and discarded after handling.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundMessage {
    pub id: String,
    pub text: String,
    pub sender_id: String,
    pub conversation_id: String,
    pub conversation_kind: ConversationKind,
}

/// Outbound side of the messaging transport. The gateway client implements
/// this; tests substitute recording mocks.
#[async_trait]
pub trait Messaging: Send + Sync {
    async fn send_text(&self, conversation_id: &str, text: &str) -> anyhow::Result<()>;

    /// React to a specific message. Callers treat failures as best-effort.
    async fn send_reaction(
        &self,
        conversation_id: &str,
        message_id: &str,
        emoji: &str,
    ) -> anyhow::Result<()>;

    /// Send a structured copy-suggestion payload with a plain-text fallback
    /// for clients that cannot render it.
    async fn send_suggestion(
        &self,
        conversation_id: &str,
        suggestion: &CopySuggestion,
    ) -> anyhow::Result<()>;
}

// ─── Catalog ─────────────────────────────────────────────────────

/// Track metadata as returned by the catalog resolver.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Track {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub artists: Vec<TrackArtist>,
    #[serde(default)]
    pub album: Option<TrackAlbum>,
    #[serde(default)]
    pub external_urls: Option<ExternalUrls>,
    #[serde(default)]
    pub preview_url: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TrackArtist {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TrackAlbum {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub images: Vec<AlbumImage>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AlbumImage {
    pub url: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ExternalUrls {
    #[serde(default)]
    pub spotify: Option<String>,
}

// ─── Coins ───────────────────────────────────────────────────────

/// The result of one successful tokenization run. Conceptually append-only:
/// no track is ever assigned two distinct coin addresses, though the
/// idempotency lookups that enforce this are best-effort, not transactional.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoinRecord {
    pub track_id: String,
    pub coin_address: String,
    pub transaction_hash: String,
    pub name: String,
    pub artist: String,
}

/// Creation request submitted to the mint backend.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoinRequest {
    pub name: String,
    pub symbol: String,
    pub uri: String,
    pub chain_id: u64,
    pub payout_recipient: String,
    pub platform_referrer: String,
    pub currency: String,
}

/// Successful mint response body.
#[derive(Clone, Debug, Deserialize)]
pub struct MintReceipt {
    #[serde(rename = "assetAddress", alias = "coinAddress")]
    pub coin_address: String,
    #[serde(rename = "transactionHash")]
    pub transaction_hash: String,
}

/// Payment requirement carried by an HTTP 402 response from the mint
/// backend. Ephemeral: consumed once to produce a signed authorization,
/// never persisted.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaymentChallenge {
    pub scheme: String,
    pub network: String,
    #[serde(rename = "maxAmountRequired")]
    pub max_amount_required: String,
    #[serde(rename = "payToAddress")]
    pub pay_to_address: String,
    #[serde(rename = "usdcAddress")]
    pub usdc_address: String,
    #[serde(rename = "requiredDeadlineSeconds", default = "default_deadline")]
    pub required_deadline_seconds: u64,
}

fn default_deadline() -> u64 {
    300
}

/// Outcome of a single mint request: either the coin was created, or the
/// backend demands payment first.
#[derive(Clone, Debug)]
pub enum MintResponse {
    Minted(MintReceipt),
    PaymentRequired(PaymentChallenge),
}

// ─── Backend ─────────────────────────────────────────────────────

/// The SongCast HTTP backend: catalog resolution, metadata publishing, coin
/// minting, and the idempotency/points registries. Everything the
/// tokenization workflow talks to goes through this seam so tests can
/// substitute mocks.
#[async_trait]
pub trait SongcastBackend: Send + Sync {
    async fn fetch_track(&self, track_id: &str) -> anyhow::Result<Track>;

    /// Publish a metadata document to content storage; returns the content
    /// URI the storage service assigned.
    async fn publish_metadata(&self, document: &serde_json::Value) -> anyhow::Result<String>;

    /// Submit a mint request, optionally carrying a signed payment header.
    async fn request_mint(
        &self,
        request: &CoinRequest,
        payment_header: Option<&str>,
    ) -> anyhow::Result<MintResponse>;

    /// Fast known-coins registry lookup.
    async fn lookup_known_coin(&self, track_id: &str) -> anyhow::Result<Option<String>>;

    /// Persistent track-to-coin map lookup.
    async fn lookup_coin_map(&self, track_id: &str) -> anyhow::Result<Option<String>>;

    async fn register_known_coin(&self, coin_address: &str) -> anyhow::Result<()>;

    async fn register_coin_map(&self, track_id: &str, coin_address: &str) -> anyhow::Result<()>;

    async fn register_points(&self, coin_address: &str) -> anyhow::Result<()>;
}
