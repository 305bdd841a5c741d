//! Idempotency Guard & Side-Effect Fan-Out
//!
//! Two best-effort registries decide whether a track was already tokenized:
//! the fast known-coins registry and the persistent track-to-coin map. Both
//! lookups fail open: a registry outage means the track looks new, and a
//! duplicate mint is accepted over a missed one. Concurrent handlers can
//! race past the guard; the registries are not transactional.

use tracing::warn;

use crate::forum::ForumClient;
use crate::types::{CoinRecord, SongcastBackend};

/// Look for an existing coin for this track, first in the known-coins
/// registry, then in the persistent map. First hit wins. Lookup errors are
/// logged and treated as a miss.
pub async fn lookup_existing(backend: &dyn SongcastBackend, track_id: &str) -> Option<String> {
    match backend.lookup_known_coin(track_id).await {
        Ok(Some(address)) => return Some(address),
        Ok(None) => {}
        Err(e) => warn!("known-coins lookup failed for {}: {:#}", track_id, e),
    }

    match backend.lookup_coin_map(track_id).await {
        Ok(found) => found,
        Err(e) => {
            warn!("coin-map lookup failed for {}: {:#}", track_id, e);
            None
        }
    }
}

/// Record a freshly minted coin in every downstream system: known-coins
/// registry, persistent map, points backend, and (when configured) a forum
/// announcement. Runs after the user already got their success reply; each
/// leg is independent, logged on failure, and never retried.
pub async fn fan_out(
    backend: &dyn SongcastBackend,
    forum: Option<&ForumClient>,
    record: &CoinRecord,
) {
    if let Err(e) = backend.register_known_coin(&record.coin_address).await {
        warn!(
            "failed to register {} in the known-coins registry: {:#}",
            record.coin_address, e
        );
    }

    if let Err(e) = backend
        .register_coin_map(&record.track_id, &record.coin_address)
        .await
    {
        warn!(
            "failed to record {} -> {} in the coin map: {:#}",
            record.track_id, record.coin_address, e
        );
    }

    if let Err(e) = backend.register_points(&record.coin_address).await {
        warn!(
            "failed to register {} with the points backend: {:#}",
            record.coin_address, e
        );
    }

    if let Some(forum) = forum {
        let title = format!("🎵 New coin: {} by {}", record.name, record.artist);
        let content = format!(
            "**{}** by {} was just tokenized on SongCast!\n\n\
             Coin address: `{}`\n\
             Transaction: `{}`\n\n\
             https://songcast.xyz/coins/{}",
            record.name,
            record.artist,
            record.coin_address,
            record.transaction_hash,
            record.coin_address
        );
        if let Err(e) = forum.post(&title, &content).await {
            warn!("forum announcement failed: {:#}", e);
        }
    }
}
