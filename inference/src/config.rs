//! Environment-variable configuration surface.
//!
//! Every knob is optional with a documented fallback so the pipeline runs
//! unconfigured against public defaults (and against the relay for the
//! image backend).

use std::env;

/// Configuration for the text-completion backend.
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Base URL of the OpenAI-compatible API
    pub base_url: String,
    /// Bearer credential; requests are sent unauthenticated when absent
    pub api_key: Option<String>,
    /// Model identifier
    pub model: String,
}

impl ChatConfig {
    /// Read from the environment.
    ///
    /// Fallbacks: `DEEPSEEK_BASE_URL` → `https://api.deepseek.com/v1`,
    /// `DEEPSEEK_API_KEY` → none, `DEEPSEEK_MODEL` → `deepseek-chat`.
    pub fn from_env() -> Self {
        Self {
            base_url: env_or("DEEPSEEK_BASE_URL", "https://api.deepseek.com/v1"),
            api_key: non_empty(env::var("DEEPSEEK_API_KEY").ok()),
            model: env_or("DEEPSEEK_MODEL", "deepseek-chat"),
        }
    }
}

/// Configuration for the image-generation backend.
#[derive(Debug, Clone)]
pub struct ImageConfig {
    /// Base URL; defaults to the local credential relay
    pub base_url: String,
    /// Bearer credential; usually injected by the relay instead
    pub api_key: Option<String>,
    /// Model identifier
    pub model: String,
}

impl ImageConfig {
    /// Read from the environment.
    ///
    /// Fallbacks: `VOLCENGINE_BASE_URL` → `http://localhost:8080`,
    /// `VOLCENGINE_API_KEY` → none (the relay injects the server-held key),
    /// `VOLCENGINE_IMAGE_MODEL` → `doubao-seedream-4-5-251128`.
    pub fn from_env() -> Self {
        Self {
            base_url: env_or("VOLCENGINE_BASE_URL", "http://localhost:8080"),
            api_key: non_empty(env::var("VOLCENGINE_API_KEY").ok()),
            model: env_or("VOLCENGINE_IMAGE_MODEL", "doubao-seedream-4-5-251128"),
        }
    }
}

fn env_or(key: &str, fallback: &str) -> String {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => value,
        _ => fallback.to_string(),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
