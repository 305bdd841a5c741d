//! Agent Configuration
//!
//! Builds the process-wide `AgentConfig` from environment variables, once,
//! at startup. No other module reads ambient state; everything downstream
//! receives the config (or values from it) explicitly so tests can inject
//! their own.

use std::env;

use alloy::signers::local::PrivateKeySigner;
use anyhow::{Context, Result};
use tracing::warn;

/// Handles the agent answers to when none are configured.
pub const DEFAULT_MENTION_HANDLES: &[&str] = &["song.base.eth", "songcast", "song"];

/// Backend URL used when `SONGCAST_BASE_URL` is unset.
const DEFAULT_BASE_URL: &str = "http://localhost:3000";

/// Forum API root used when `FORUM_API_URL` is unset.
const DEFAULT_FORUM_API_URL: &str = "https://www.moltbook.com/api/v1";

/// Board the mint announcements go to when `FORUM_BOARD` is unset.
const DEFAULT_FORUM_BOARD: &str = "clawrinet";

/// Optional forum cross-posting integration.
#[derive(Clone, Debug)]
pub struct ForumConfig {
    pub api_url: String,
    pub api_key: String,
    pub board: String,
}

/// Process-wide configuration, read-only after startup.
#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// Hex-encoded secp256k1 key used to sign payment authorizations.
    pub wallet_key: String,
    /// SongCast backend root (catalog, storage, mint, registries).
    pub base_url: String,
    /// Messaging gateway root the agent polls and posts to.
    pub gateway_url: String,
    /// Handle aliases for mention detection.
    pub mention_handles: Vec<String>,
    /// Payout recipient for minted coins; the zero address when unset.
    pub escrow_address: Option<String>,
    /// Forum cross-posting, enabled only when an API key is present.
    pub forum: Option<ForumConfig>,
    /// Trading-assistant relay root; the relay branch is disabled when unset.
    pub relay_url: Option<String>,
}

impl AgentConfig {
    /// Read and validate configuration from the environment.
    ///
    /// Missing or malformed required secrets are fatal: the caller is
    /// expected to abort startup on error.
    pub fn from_env() -> Result<Self> {
        let wallet_key = env::var("SONGCAST_WALLET_KEY")
            .context("SONGCAST_WALLET_KEY environment variable is required")?;
        validate_wallet_key(&wallet_key)?;

        let gateway_url = env::var("SONGCAST_GATEWAY_URL")
            .context("SONGCAST_GATEWAY_URL environment variable is required")?;

        let base_url =
            env::var("SONGCAST_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        if base_url.contains("localhost") || base_url.contains("127.0.0.1") {
            warn!(
                "Using localhost backend ({}) - set SONGCAST_BASE_URL to your deployed URL \
                 for production",
                base_url
            );
        }

        let mention_handles = resolve_handles(env::var("MENTION_HANDLES").ok());

        let escrow_address = match env::var("ESCROW_ADDRESS") {
            Ok(raw) if !raw.trim().is_empty() => {
                let addr = raw.trim().to_string();
                addr.parse::<alloy::primitives::Address>()
                    .context("ESCROW_ADDRESS is not a valid Ethereum address")?;
                Some(addr)
            }
            _ => None,
        };

        let forum = env::var("FORUM_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty())
            .map(|api_key| ForumConfig {
                api_url: env::var("FORUM_API_URL")
                    .unwrap_or_else(|_| DEFAULT_FORUM_API_URL.to_string()),
                api_key,
                board: env::var("FORUM_BOARD")
                    .unwrap_or_else(|_| DEFAULT_FORUM_BOARD.to_string()),
            });

        let relay_url = env::var("RELAY_API_URL").ok().filter(|u| !u.is_empty());

        Ok(Self {
            wallet_key,
            base_url,
            gateway_url,
            mention_handles,
            escrow_address,
            forum,
            relay_url,
        })
    }

    /// Parse the configured wallet key into a signer.
    pub fn signer(&self) -> Result<PrivateKeySigner> {
        self.wallet_key
            .parse()
            .context("Failed to parse SONGCAST_WALLET_KEY into a signer")
    }
}

/// Split a comma-separated handle list, trimming whitespace and dropping
/// empty entries.
pub fn parse_handles(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
        .collect()
}

/// Resolve the mention handle set from the raw env value. Unset or
/// effectively empty (only commas/whitespace) falls back to the defaults so
/// the gate always has at least one handle.
fn resolve_handles(raw: Option<String>) -> Vec<String> {
    let parsed = raw.as_deref().map(parse_handles).unwrap_or_default();
    if parsed.is_empty() {
        DEFAULT_MENTION_HANDLES
            .iter()
            .map(|h| h.to_string())
            .collect()
    } else {
        parsed
    }
}

/// Check that the wallet key parses into a usable signer, with a hint on
/// the expected format.
fn validate_wallet_key(key: &str) -> Result<()> {
    key.parse::<PrivateKeySigner>().map(|_| ()).context(
        "SONGCAST_WALLET_KEY must be a 32-byte hex private key \
         (64 hex characters, optionally 0x-prefixed)",
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    // Well-known throwaway development key.
    const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn test_parse_handles_trims_and_drops_empty() {
        let handles = parse_handles("song.base.eth, songcast,,  song ");
        assert_eq!(handles, vec!["song.base.eth", "songcast", "song"]);
    }

    #[test]
    fn test_resolve_handles_falls_back_on_empty() {
        assert_eq!(
            resolve_handles(Some("alice,bob".to_string())),
            vec!["alice", "bob"]
        );
        // Unset and set-but-empty both get the defaults.
        assert_eq!(resolve_handles(None), DEFAULT_MENTION_HANDLES);
        assert_eq!(resolve_handles(Some(String::new())), DEFAULT_MENTION_HANDLES);
        assert_eq!(
            resolve_handles(Some(" , ,".to_string())),
            DEFAULT_MENTION_HANDLES
        );
    }

    #[test]
    fn test_validate_wallet_key_accepts_hex_key() {
        assert!(validate_wallet_key(TEST_KEY).is_ok());
        assert!(validate_wallet_key(TEST_KEY.trim_start_matches("0x")).is_ok());
    }

    #[test]
    fn test_validate_wallet_key_rejects_garbage() {
        assert!(validate_wallet_key("not-a-key").is_err());
        assert!(validate_wallet_key("0x1234").is_err());
    }

    // The only test that mutates the process environment; keep it that way
    // so it cannot race with other tests.
    #[test]
    fn test_from_env_ignores_empty_optional_integrations() {
        env::set_var("SONGCAST_WALLET_KEY", TEST_KEY);
        env::set_var("SONGCAST_GATEWAY_URL", "http://localhost:4000");
        env::set_var("FORUM_API_KEY", "");
        env::set_var("RELAY_API_URL", "");
        env::set_var("MENTION_HANDLES", "");

        let config = AgentConfig::from_env().unwrap();
        assert!(config.forum.is_none());
        assert!(config.relay_url.is_none());
        assert_eq!(config.mention_handles, DEFAULT_MENTION_HANDLES);
    }
}
