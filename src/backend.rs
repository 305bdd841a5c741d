//! SongCast Backend Client
//!
//! HTTP client for the SongCast backend: catalog resolution, metadata
//! publishing, coin minting (with 402 payment detection), and the
//! known-coins / track-map / points registries.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::coin::x402::{self, PAYMENT_HEADER};
use crate::types::{CoinRequest, MintReceipt, MintResponse, SongcastBackend, Track};

/// HTTP implementation of [`SongcastBackend`].
pub struct HttpBackend {
    pub base_url: String,
    http: Client,
}

impl HttpBackend {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            http: Client::new(),
        }
    }

    /// Internal helper: send a request to the backend and return JSON.
    async fn request(&self, method: &str, path: &str, body: Option<Value>) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);

        let mut builder = match method {
            "POST" => self.http.post(&url),
            _ => self.http.get(&url),
        };
        builder = builder.header("Content-Type", "application/json");
        if let Some(b) = body {
            builder = builder.json(&b);
        }

        let resp = builder
            .send()
            .await
            .with_context(|| format!("Backend request failed: {} {}", method, path))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!(
                "Backend error: {} {} -> {}: {}",
                method,
                path,
                status.as_u16(),
                error_text(&text)
            );
        }

        let json: Value = resp
            .json()
            .await
            .with_context(|| format!("Backend returned non-JSON for {} {}", method, path))?;
        Ok(json)
    }
}

/// Pull the `error` field out of an error body when one exists, otherwise
/// return the raw text.
fn error_text(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"].as_str().map(|s| s.to_string()))
        .unwrap_or_else(|| body.to_string())
}

/// Assemble the content URI from a storage publish response. Accepts either
/// a ready-made `uri` or a bare `IpfsHash`.
pub(crate) fn metadata_uri_from(body: &Value) -> Option<String> {
    if let Some(uri) = body["uri"].as_str() {
        return Some(uri.to_string());
    }
    body["IpfsHash"]
        .as_str()
        .map(|hash| format!("ipfs://{}", hash))
}

/// Registry lookup response shape, shared by `/known` and `/map`.
#[derive(serde::Deserialize)]
struct LookupResponse {
    #[serde(default)]
    exists: bool,
    #[serde(rename = "assetAddress", default)]
    asset_address: Option<String>,
}

impl LookupResponse {
    fn into_address(self) -> Option<String> {
        if self.exists {
            self.asset_address
        } else {
            None
        }
    }
}

#[async_trait]
impl SongcastBackend for HttpBackend {
    async fn fetch_track(&self, track_id: &str) -> Result<Track> {
        let path = format!("/catalog/track?id={}", urlencoding::encode(track_id));
        let body = self
            .request("GET", &path, None)
            .await
            .context("Spotify track lookup failed")?;
        serde_json::from_value(body).context("Spotify track response was malformed")
    }

    async fn publish_metadata(&self, document: &Value) -> Result<String> {
        let body = self
            .request("POST", "/storage/json", Some(document.clone()))
            .await
            .context("Metadata upload failed")?;
        metadata_uri_from(&body).with_context(|| {
            format!(
                "Storage service returned no content URI: {}",
                body["error"].as_str().unwrap_or("unknown error")
            )
        })
    }

    async fn request_mint(
        &self,
        request: &CoinRequest,
        payment_header: Option<&str>,
    ) -> Result<MintResponse> {
        let url = format!("{}/mint", self.base_url);

        let mut builder = self
            .http
            .post(&url)
            .header("Content-Type", "application/json")
            .json(request);
        if let Some(header) = payment_header {
            builder = builder.header(PAYMENT_HEADER, header);
        }

        let resp = builder
            .send()
            .await
            .context("Backend request failed: POST /mint")?;

        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();

        if status.as_u16() == 402 {
            let body: Value = serde_json::from_str(&text)
                .context("Payment-required response carried a non-JSON body")?;
            let challenge = x402::parse_challenge(&body)
                .context("Could not parse payment requirements from 402 response")?;
            return Ok(MintResponse::PaymentRequired(challenge));
        }

        if !status.is_success() {
            anyhow::bail!(
                "Failed to create coin: {} ({})",
                error_text(&text),
                status.as_u16()
            );
        }

        let receipt: MintReceipt =
            serde_json::from_str(&text).context("Mint response was missing the coin address")?;
        Ok(MintResponse::Minted(receipt))
    }

    async fn lookup_known_coin(&self, track_id: &str) -> Result<Option<String>> {
        let path = format!("/known/{}", urlencoding::encode(track_id));
        let body = self.request("GET", &path, None).await?;
        let parsed: LookupResponse =
            serde_json::from_value(body).context("Known-coin lookup response was malformed")?;
        Ok(parsed.into_address())
    }

    async fn lookup_coin_map(&self, track_id: &str) -> Result<Option<String>> {
        let path = format!("/map/{}", urlencoding::encode(track_id));
        let body = self.request("GET", &path, None).await?;
        let parsed: LookupResponse =
            serde_json::from_value(body).context("Coin-map lookup response was malformed")?;
        Ok(parsed.into_address())
    }

    async fn register_known_coin(&self, coin_address: &str) -> Result<()> {
        self.request(
            "POST",
            "/known",
            Some(serde_json::json!({ "assetAddress": coin_address })),
        )
        .await?;
        Ok(())
    }

    async fn register_coin_map(&self, track_id: &str, coin_address: &str) -> Result<()> {
        self.request(
            "POST",
            "/map",
            Some(serde_json::json!({
                "identifier": track_id,
                "assetAddress": coin_address,
            })),
        )
        .await?;
        Ok(())
    }

    async fn register_points(&self, coin_address: &str) -> Result<()> {
        self.request(
            "POST",
            "/points/add-asset",
            Some(serde_json::json!({ "assetAddress": coin_address })),
        )
        .await?;
        Ok(())
    }
}
