//! Mock chat backend for testing.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use super::traits::*;
use crate::cancel::CancelToken;
use crate::stream::FragmentStream;

/// Mock backend with scripted responses.
pub struct MockBackend {
    model_id: String,
    response_content: String,
    fragments: Option<Vec<String>>,
    fail: AtomicBool,
    call_count: AtomicU32,
}

impl MockBackend {
    /// Create a new mock backend.
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            response_content: "Mock response".to_string(),
            fragments: None,
            fail: AtomicBool::new(false),
            call_count: AtomicU32::new(0),
        }
    }

    /// Set the scripted response content.
    pub fn with_response(mut self, content: impl Into<String>) -> Self {
        self.response_content = content.into();
        self
    }

    /// Script the exact fragment sequence for streaming calls.
    ///
    /// Without a script, streaming yields the response content as one
    /// fragment.
    pub fn with_fragments(mut self, fragments: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.fragments = Some(fragments.into_iter().map(Into::into).collect());
        self
    }

    /// Make every call fail with a transport error.
    pub fn with_failure(self, fail: bool) -> Self {
        self.fail.store(fail, Ordering::SeqCst);
        self
    }

    /// Number of completed calls (blocking or streaming).
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }

    fn check_failure(&self) -> Result<(), InferenceError> {
        if self.fail.load(Ordering::SeqCst) {
            Err(InferenceError::Transport(
                "mock backend configured to fail".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new("mock-model")
    }
}

#[async_trait]
impl ChatBackend for MockBackend {
    fn id(&self) -> &str {
        &self.model_id
    }

    async fn complete(&self, _messages: &[ChatMessage]) -> Result<String, InferenceError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;
        Ok(self.response_content.clone())
    }

    async fn complete_stream(
        &self,
        _messages: &[ChatMessage],
        cancel: CancelToken,
    ) -> Result<FragmentStream, InferenceError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;

        let fragments = self
            .fragments
            .clone()
            .unwrap_or_else(|| vec![self.response_content.clone()]);

        let (sender, stream) = FragmentStream::channel(1);
        tokio::spawn(async move {
            for fragment in fragments {
                if cancel.is_cancelled() {
                    break;
                }
                if sender.send(fragment).await.is_err() {
                    break;
                }
            }
        });

        Ok(stream)
    }
}
