//! Chat backend abstraction layer.
//!
//! Provides a trait-based interface over completion services:
//! - DeepSeek / OpenAI-compatible HTTP APIs
//! - Mock backend for testing

pub mod deepseek;
pub mod mock;
pub mod traits;

pub use deepseek::DeepSeekBackend;
pub use mock::MockBackend;
pub use traits::{ChatBackend, ChatMessage, InferenceError, Role};
