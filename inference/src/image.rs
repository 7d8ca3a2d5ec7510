//! Image-generation client.
//!
//! Talks to the Volcengine Ark endpoint (OpenAI-compatible shape) behind
//! the credential relay. The contract is "returns a URL or fails"; the
//! placeholder fallback keeps the capability-test flow alive when the
//! backend is unreachable.

use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;

use crate::backend::traits::InferenceError;
use crate::config::ImageConfig;

/// Minimum-pixel-count sizes accepted by doubao-seedream for each
/// supported aspect ratio.
const SIZE_SQUARE: &str = "2048x2048";
const SIZE_PORTRAIT: &str = "1728x2304";
const SIZE_WIDE: &str = "2560x1440";

/// Client for the image-generation endpoint.
pub struct ImageClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

#[derive(Debug, Serialize)]
struct ImageRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    size: &'a str,
    n: u8,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Debug, Deserialize)]
struct ImageData {
    url: Option<String>,
}

impl ImageClient {
    /// Create a new client.
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            api_key,
            model: model.into(),
        }
    }

    /// Create a client from environment configuration.
    pub fn from_env() -> Self {
        let config = ImageConfig::from_env();
        Self::new(config.base_url, config.model, config.api_key)
    }

    /// Pick the render size from aspect-ratio markers embedded in the prompt.
    fn size_for_prompt(prompt: &str) -> &'static str {
        if prompt.contains("比例: 3:4") {
            SIZE_PORTRAIT
        } else if prompt.contains("比例: 16:9") {
            SIZE_WIDE
        } else {
            SIZE_SQUARE
        }
    }

    /// Generate one image; returns its URL or fails.
    pub async fn generate(&self, prompt: &str) -> Result<String, InferenceError> {
        let body = ImageRequest {
            model: &self.model,
            prompt,
            size: Self::size_for_prompt(prompt),
            n: 1,
        };

        let url = format!("{}/api/v3/images/generations", self.base_url);
        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", key));
        }

        let response = request
            .send()
            .await
            .map_err(|e| InferenceError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(InferenceError::Upstream { status, body });
        }

        let parsed: ImageResponse = response
            .json()
            .await
            .map_err(|e| InferenceError::Parse(e.to_string()))?;

        parsed
            .data
            .into_iter()
            .next()
            .and_then(|d| d.url)
            .ok_or_else(|| InferenceError::Parse("No image URL in response".to_string()))
    }

    /// Generate an image, falling back to a deterministic seeded
    /// placeholder when the backend fails.
    pub async fn generate_or_placeholder(&self, prompt: &str) -> String {
        match self.generate(prompt).await {
            Ok(url) => url,
            Err(err) => {
                warn!(error = %err, "image backend failed, using placeholder");
                placeholder_url(prompt)
            }
        }
    }
}

/// Seeded placeholder image, unique per prompt and moment.
pub fn placeholder_url(prompt: &str) -> String {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let seed: String = prompt
        .chars()
        .filter(|c| c.is_alphanumeric())
        .take(32)
        .collect();
    format!("https://picsum.photos/seed/{}-{}/800/600", seed, timestamp)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_selection_from_prompt_markers() {
        assert_eq!(ImageClient::size_for_prompt("夏日海报 比例: 3:4"), SIZE_PORTRAIT);
        assert_eq!(ImageClient::size_for_prompt("封面图 比例: 16:9"), SIZE_WIDE);
        assert_eq!(ImageClient::size_for_prompt("产品图"), SIZE_SQUARE);
    }

    #[test]
    fn test_placeholder_is_seeded_by_prompt() {
        let url = placeholder_url("露营笔记");
        assert!(url.starts_with("https://picsum.photos/seed/露营笔记-"));
        assert!(url.ends_with("/800/600"));
    }
}
