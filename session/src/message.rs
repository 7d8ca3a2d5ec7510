//! Transcript messages.

use serde::{Deserialize, Serialize};

use taala_inference::{ChatMessage, Role};

/// What a message carries: text, or the URL of a generated image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Image,
}

/// One turn in the session transcript. The sequence is append-only and
/// owned exclusively by the controller for the session's lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    pub kind: MessageKind,
}

impl Message {
    /// User-authored text turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            kind: MessageKind::Text,
        }
    }

    /// Assistant text turn.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            kind: MessageKind::Text,
        }
    }

    /// Assistant image turn; content is the image URL.
    pub fn assistant_image(url: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: url.into(),
            kind: MessageKind::Image,
        }
    }

    /// Wire form for completion requests and evaluation. Image turns have
    /// no wire form; the model only ever sees text.
    pub fn to_chat(&self) -> Option<ChatMessage> {
        match self.kind {
            MessageKind::Text => Some(ChatMessage {
                role: self.role,
                content: self.content.clone(),
            }),
            MessageKind::Image => None,
        }
    }
}
