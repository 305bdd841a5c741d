//! SongCast Agent Runtime
//!
//! The entry point for the music tokenizer agent.
//! Handles CLI args, config validation, the startup gateway probe,
//! and the poll/dispatch loop.

use std::sync::Arc;

use alloy::signers::Signer;
use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};

use songcast_agent::backend::HttpBackend;
use songcast_agent::config::AgentConfig;
use songcast_agent::dispatch::Dispatcher;
use songcast_agent::transport::GatewayClient;
use songcast_agent::types::{Messaging, SongcastBackend};

const VERSION: &str = "0.1.0";

/// How often the gateway is polled for new events.
const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// SongCast Agent -- Music Tokenizer
#[derive(Parser, Debug)]
#[command(
    name = "songcast-agent",
    version = VERSION,
    about = "SongCast Agent -- Music Tokenizer",
    long_about = "Chat agent that tokenizes Spotify tracks into on-chain coins."
)]
struct Cli {
    /// Start the agent
    #[arg(long)]
    run: bool,

    /// Print the agent's wallet address and exit
    #[arg(long)]
    address: bool,
}

// ---- Main Run ---------------------------------------------------------------

/// Load config, probe the gateway, then poll and dispatch until shutdown.
async fn run() -> Result<()> {
    info!("SongCast agent v{} starting...", VERSION);

    let config = AgentConfig::from_env()?;
    let signer = config.signer()?;
    info!("Agent wallet: {}", signer.address().to_checksum(None));
    info!("Backend: {}", config.base_url);
    info!("Gateway: {}", config.gateway_url);

    let gateway = GatewayClient::new(config.gateway_url.clone());

    // One probe before entering the loop. A dead gateway at startup is a
    // deployment problem, not something to retry silently.
    gateway.poll_events(None).await.with_context(|| {
        format!(
            "Messaging gateway connection failed ({}). This could be due to:\n\
             1. Network connectivity issues (check your internet connection)\n\
             2. The gateway not running yet (start it and try again)\n\
             3. A wrong SONGCAST_GATEWAY_URL setting",
            config.gateway_url
        )
    })?;
    info!("Gateway reachable, listening for messages");

    let messaging: Arc<dyn Messaging> = Arc::new(gateway.clone());
    let backend: Arc<dyn SongcastBackend> = Arc::new(HttpBackend::new(config.base_url.clone()));
    let dispatcher = Arc::new(Dispatcher::new(&config, messaging, backend)?);

    // Handle graceful shutdown
    let shutdown = async {
        let ctrl_c = signal::ctrl_c();
        #[cfg(unix)]
        {
            let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
                .expect("Failed to register SIGTERM handler");

            tokio::select! {
                _ = ctrl_c => info!("Received SIGINT, shutting down..."),
                _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
            }
        }
        #[cfg(not(unix))]
        {
            ctrl_c.await.expect("Failed to register Ctrl+C handler");
            info!("Received shutdown signal...");
        }
    };

    tokio::select! {
        _ = shutdown => {
            info!("Shutting down gracefully...");
        }
        _ = poll_loop(&gateway, &dispatcher) => {}
    }

    Ok(())
}

/// The inner loop: poll the gateway, spawn one handler task per message.
/// Poll failures are transient by assumption and only logged.
async fn poll_loop(gateway: &GatewayClient, dispatcher: &Arc<Dispatcher>) {
    let mut cursor: Option<String> = None;

    loop {
        match gateway.poll_events(cursor.as_deref()).await {
            Ok((messages, next_cursor)) => {
                if next_cursor.is_some() {
                    cursor = next_cursor;
                }
                for message in messages {
                    info!(
                        "Received message from {} in {}",
                        message.sender_id, message.conversation_id
                    );
                    let dispatcher = Arc::clone(dispatcher);
                    tokio::spawn(async move {
                        dispatcher.handle_message(message).await;
                    });
                }
            }
            Err(e) => warn!("Event poll failed: {:#}", e),
        }

        sleep(POLL_INTERVAL).await;
    }
}

// ---- Entry Point -----------------------------------------------------------

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    if cli.address {
        match AgentConfig::from_env().and_then(|c| c.signer()) {
            Ok(signer) => println!("{}", signer.address().to_checksum(None)),
            Err(e) => {
                eprintln!("Failed to load wallet: {:#}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    if cli.run {
        if let Err(e) = run().await {
            error!("Fatal: {:#}", e);
            std::process::exit(1);
        }
        return;
    }

    // Default: show help
    println!("Run \"songcast-agent --help\" for usage information.");
    println!("Run \"songcast-agent --run\" to start the agent.");
}
