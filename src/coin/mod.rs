//! Coin Creation
//!
//! The tokenize-once pipeline: idempotency lookups, the mint workflow with
//! its payment handshake, x402 signing, and the classified failure messages
//! shown to users when a run fails.

pub mod idempotency;
pub mod workflow;
pub mod x402;

use thiserror::Error;

/// User-facing classification of a failed tokenization run. Specific causes
/// are preferred over the generic fallback; selection inspects the error
/// chain's descriptive text.
#[derive(Debug, Error)]
pub enum MintFailure {
    #[error(
        "Cannot connect to the server at {0}. Make sure the backend is running, \
         or set SONGCAST_BASE_URL to your production URL."
    )]
    Connectivity(String),

    #[error("Insufficient funds for payment. Please ensure the agent wallet has USDC.")]
    InsufficientFunds,

    #[error("Payment processing failed. Please try again.")]
    Payment,

    #[error("Failed to fetch track from Spotify. Please check the track URL.")]
    Resolver,

    #[error("{0}")]
    Other(String),
}

/// Classify a workflow error for the user reply.
pub fn classify_failure(err: &anyhow::Error, base_url: &str) -> MintFailure {
    let text = format!("{:#}", err);
    let lower = text.to_lowercase();

    if lower.contains("econnrefused")
        || lower.contains("connection refused")
        || lower.contains("error sending request")
    {
        MintFailure::Connectivity(base_url.to_string())
    } else if lower.contains("insufficient funds") {
        MintFailure::InsufficientFunds
    } else if lower.contains("payment") {
        MintFailure::Payment
    } else if lower.contains("spotify") {
        MintFailure::Resolver
    } else {
        MintFailure::Other(text)
    }
}
