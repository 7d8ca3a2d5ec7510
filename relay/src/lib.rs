//! Taala Relay - credential-injecting proxy
//!
//! Fronts the image-generation upstream so the API key stays
//! server-side and browser clients clear CORS. Auth resolution,
//! preflight handling, and pass-through forwarding live in
//! [`server`]; [`config`] holds the clap argument surface.

pub mod config;
pub mod server;

pub use config::Args;
pub use server::{resolve_auth, run, AppState};
