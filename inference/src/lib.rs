//! Taala Inference - streaming completion and image-generation clients
//!
//! Provides the network layer for the capability-evaluation pipeline:
//! - Trait-based chat backends (DeepSeek/OpenAI-compatible, mock)
//! - Incremental SSE delivery with cooperative cancellation
//! - Image generation with a deterministic placeholder fallback
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │            ChatBackend trait            │
//! │   (complete / complete_stream seam)     │
//! └────────────────┬────────────────────────┘
//!                  │
//!      ┌───────────┴───────────┐
//!      ▼                       ▼
//! ┌─────────────┐       ┌─────────────┐
//! │ DeepSeek    │       │ Mock        │
//! │ (SSE over   │       │ (scripted,  │
//! │  reqwest)   │       │  for tests) │
//! └─────────────┘       └─────────────┘
//! ```

pub mod backend;
pub mod cancel;
pub mod config;
pub mod image;
pub mod sse;
pub mod stream;

// Re-export main types for convenience
pub use backend::deepseek::DeepSeekBackend;
pub use backend::mock::MockBackend;
pub use backend::traits::{ChatBackend, ChatMessage, InferenceError, Role};
pub use cancel::CancelToken;
pub use config::{ChatConfig, ImageConfig};
pub use image::ImageClient;
pub use stream::{FragmentSender, FragmentStream};
