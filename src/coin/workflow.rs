//! Tokenization Workflow
//!
//! The linear per-track state machine:
//! fetch metadata -> build document -> publish -> request mint
//! [-> payment required -> sign -> retry mint] -> success | failed.
//!
//! Every step is a sequential awaited call; the only automatic retry is the
//! single payment retry. Once the mint request is issued the workflow runs
//! to completion, success or failure.

use alloy::signers::Signer;
use anyhow::{Context, Result};
use serde_json::Value;

use crate::coin::x402;
use crate::types::{CoinRecord, CoinRequest, MintResponse, SongcastBackend, Track};

/// Target network for all mints (Base mainnet).
const CHAIN_ID: u64 = 8453;

/// Platform referrer attached to every creation request.
const PLATFORM_REFERRER: &str = "0x32C8ACD3118766CBE5c3E45a44BCEDde953EF627";

/// Payout recipient when no escrow address is configured.
const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// Cover image used when the track has no album art.
const DEFAULT_COVER_IMAGE: &str = "https://songcast.xyz/images/default-cover.jpg";

/// Symbol used when a track name contains no alphanumeric characters.
const FALLBACK_SYMBOL: &str = "SPOTIFY";

const FALLBACK_TRACK_NAME: &str = "Spotify Track";
const FALLBACK_ARTIST_NAME: &str = "Spotify Artist";

const CURRENCY: &str = "ZORA";

/// Run the full tokenization workflow for one track identifier.
///
/// `payout_recipient` is the configured escrow address; the zero address is
/// used when unset. On an HTTP 402 the payment challenge is signed and the
/// mint retried exactly once; a second 402 is terminal.
pub async fn create_coin_for_track<S: Signer + Send + Sync>(
    backend: &dyn SongcastBackend,
    signer: &S,
    payout_recipient: Option<&str>,
    track_id: &str,
) -> Result<CoinRecord> {
    // FetchMetadata
    let track = backend.fetch_track(track_id).await?;

    // BuildDocument
    let name = track_name(&track);
    let artist = primary_artist(&track);
    let document = build_metadata_document(&track);

    // PublishDocument
    let uri = backend.publish_metadata(&document).await?;
    if !uri.starts_with("ipfs://") {
        anyhow::bail!("Failed to upload metadata to IPFS: unexpected URI {}", uri);
    }

    // RequestMint
    let request = CoinRequest {
        name: name.clone(),
        symbol: derive_symbol(&name),
        uri,
        chain_id: CHAIN_ID,
        payout_recipient: payout_recipient.unwrap_or(ZERO_ADDRESS).to_string(),
        platform_referrer: PLATFORM_REFERRER.to_string(),
        currency: CURRENCY.to_string(),
    };

    let receipt = match backend.request_mint(&request, None).await? {
        MintResponse::Minted(receipt) => receipt,
        MintResponse::PaymentRequired(challenge) => {
            let header = x402::sign_challenge(signer, &challenge)
                .await
                .context("payment authorization could not be signed")?;
            match backend.request_mint(&request, Some(&header)).await? {
                MintResponse::Minted(receipt) => receipt,
                MintResponse::PaymentRequired(_) => {
                    anyhow::bail!("payment was not accepted after signing; giving up")
                }
            }
        }
    };

    Ok(CoinRecord {
        track_id: track_id.to_string(),
        coin_address: receipt.coin_address,
        transaction_hash: receipt.transaction_hash,
        name,
        artist,
    })
}

/// Track name with the fixed fallback for empty catalog data.
pub fn track_name(track: &Track) -> String {
    if track.name.is_empty() {
        FALLBACK_TRACK_NAME.to_string()
    } else {
        track.name.clone()
    }
}

/// First artist name with the fixed fallback.
pub fn primary_artist(track: &Track) -> String {
    track
        .artists
        .first()
        .filter(|a| !a.name.is_empty())
        .map(|a| a.name.clone())
        .unwrap_or_else(|| FALLBACK_ARTIST_NAME.to_string())
}

/// Derive the coin symbol: strip non-alphanumerics, uppercase, truncate to
/// 11 characters, fall back to a fixed token when nothing remains.
pub fn derive_symbol(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(11)
        .collect::<String>()
        .to_uppercase();
    if cleaned.is_empty() {
        FALLBACK_SYMBOL.to_string()
    } else {
        cleaned
    }
}

/// Build the metadata document published to content storage. Required
/// fields are always present; cover image falls back to the default, and
/// the external/preview links are included only when the catalog has them.
pub fn build_metadata_document(track: &Track) -> Value {
    let name = track_name(track);
    let artist = primary_artist(track);
    let external_url = track
        .external_urls
        .as_ref()
        .and_then(|u| u.spotify.clone())
        .unwrap_or_default();
    let album_name = track
        .album
        .as_ref()
        .map(|a| a.name.clone())
        .unwrap_or_default();
    let album_image = track
        .album
        .as_ref()
        .and_then(|a| a.images.first())
        .map(|i| i.url.clone());

    let mut document = serde_json::json!({
        "name": name,
        "description": format!(
            "{} by {} (imported from Spotify to @songcast). Listen on Spotify: {}",
            name, artist, external_url
        ),
        "artist": artist,
        "image": album_image.unwrap_or_else(|| DEFAULT_COVER_IMAGE.to_string()),
        "properties": {
            "spotify_track_id": track.id,
            "spotify_artist_id": track.artists.first().map(|a| a.id.clone()).unwrap_or_default(),
            "spotify_artist_name": artist,
            "spotify_album": album_name,
            "spotify_external_url": external_url,
        },
        "attributes": [
            { "trait_type": "Artist", "value": artist },
            { "trait_type": "Genre", "value": "Spotify" },
            { "trait_type": "Type", "value": "Music" },
            { "trait_type": "Source", "value": "Spotify" },
        ],
    });

    if !external_url.is_empty() {
        document["external_url"] = Value::String(external_url);
    }
    if let Some(preview) = &track.preview_url {
        document["animation_url"] = Value::String(preview.clone());
    }

    document
}
