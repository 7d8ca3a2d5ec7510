//! Taala Relay entry point.

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use taala_relay::{run, AppState, Args};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("taala_relay={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("======================================");
    info!("  Taala Relay");
    info!("======================================");
    info!("Listen: {}", args.listen);
    info!("Upstream: {}", args.upstream_url);
    info!(
        "API key: {}",
        if args.api_key.is_some() { "configured" } else { "not set" }
    );
    info!("======================================");

    let state = Arc::new(AppState::new(args));

    if let Err(e) = run(state).await {
        error!("Server error: {:?}", e);
        std::process::exit(1);
    }

    Ok(())
}
