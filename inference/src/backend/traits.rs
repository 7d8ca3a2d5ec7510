//! Core trait for chat completion backends.
//!
//! This module defines the `ChatBackend` trait - the abstraction the
//! session controller and evaluation engine talk to instead of a
//! concrete HTTP client.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::cancel::CancelToken;
use crate::stream::FragmentStream;

/// Error types for inference operations.
#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    /// Network or connection failure before a response was obtained
    #[error("Transport error: {0}")]
    Transport(String),

    /// Non-success response from the remote service
    #[error("Upstream error: HTTP {status}: {body}")]
    Upstream { status: u16, body: String },

    /// Malformed response payload
    #[error("Parse error: {0}")]
    Parse(String),
}

/// Core trait for completion backends.
///
/// Both operations send the full transcript. At most one stream should be
/// outstanding per backend instance; the caller gates this with its own
/// busy flag rather than the backend enforcing it.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Backend identifier (e.g. model name).
    fn id(&self) -> &str;

    /// Blocking completion: returns the first choice's full message text.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, InferenceError>;

    /// Streaming completion: returns an ordered stream of text fragments.
    ///
    /// Fragments arrive in exact wire order. Signalling `cancel` stops the
    /// backend at its next suspension point and closes the stream normally;
    /// cancellation is never surfaced as an error.
    async fn complete_stream(
        &self,
        messages: &[ChatMessage],
        cancel: CancelToken,
    ) -> Result<FragmentStream, InferenceError>;
}

/// A message in the conversation, in wire format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message sender
    pub role: Role,
    /// Content of the message
    pub content: String,
}

impl ChatMessage {
    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// Role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}
