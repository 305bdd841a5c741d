//! SongCast Agent -- Music Tokenizer
//!
//! A chat agent that watches a messaging network for Spotify track links
//! and turns each unique track into an on-chain coin, paying the mint
//! backend through the x402 handshake when asked to.

pub mod types;
pub mod config;
pub mod extract;
pub mod mentions;
pub mod dispatch;
pub mod coin;
pub mod backend;
pub mod transport;
pub mod suggestion;
pub mod relay;
pub mod forum;
