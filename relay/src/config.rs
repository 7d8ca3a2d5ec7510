//! Configuration for the relay.
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;

/// Taala Relay - credential-injecting proxy for image generation
///
/// Browsers cannot call the image upstream directly (CORS, and the key
/// must never ship to the client), so this relay fronts it.
#[derive(Parser, Debug, Clone)]
#[command(name = "taala-relay")]
#[command(about = "Credential-injecting relay for the image-generation upstream")]
pub struct Args {
    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Upstream image-generation endpoint
    #[arg(
        long,
        env = "UPSTREAM_URL",
        default_value = "https://ark.cn-beijing.volces.com/api/v3/images/generations"
    )]
    pub upstream_url: String,

    /// Server-side API key. When set it overrides any inbound
    /// Authorization header; inbound credentials are never forwarded.
    #[arg(long, env = "VOLCENGINE_API_KEY")]
    pub api_key: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}
