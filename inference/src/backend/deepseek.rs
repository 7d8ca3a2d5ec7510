//! DeepSeek chat backend.
//!
//! Speaks the OpenAI-compatible completion wire format, so it also works
//! against any service exposing `/chat/completions` with SSE streaming.

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{header, Client};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::traits::*;
use crate::cancel::CancelToken;
use crate::config::ChatConfig;
use crate::sse::{self, Frame};
use crate::stream::{FragmentSender, FragmentStream};

/// DeepSeek / OpenAI-compatible backend.
pub struct DeepSeekBackend {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl DeepSeekBackend {
    /// Create a new backend.
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            header::HeaderValue::from_static("application/json"),
        );

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: base_url.into(),
            api_key,
            model: model.into(),
        }
    }

    /// Create a backend for the public DeepSeek API.
    pub fn deepseek(api_key: impl Into<String>) -> Self {
        Self::new(
            "https://api.deepseek.com/v1",
            "deepseek-chat",
            Some(api_key.into()),
        )
    }

    /// Create a backend from environment configuration.
    pub fn from_env() -> Self {
        Self::from_config(ChatConfig::from_env())
    }

    /// Create a backend from explicit configuration.
    pub fn from_config(config: ChatConfig) -> Self {
        Self::new(config.base_url, config.model, config.api_key)
    }

    fn chat_completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn auth_header(&self) -> Option<String> {
        self.api_key.as_ref().map(|k| format!("Bearer {}", k))
    }

    async fn send_request(
        &self,
        messages: &[ChatMessage],
        stream: bool,
    ) -> Result<reqwest::Response, InferenceError> {
        let body = ChatRequest {
            model: &self.model,
            messages,
            stream,
        };

        let mut request = self.client.post(self.chat_completions_url()).json(&body);
        if let Some(auth) = self.auth_header() {
            request = request.header(header::AUTHORIZATION, auth);
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

        Ok(response)
    }
}

/// Chat completion request body.
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

/// Non-streaming completion response.
#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: MessageBody,
}

#[derive(Debug, Deserialize)]
struct MessageBody {
    content: Option<String>,
}

#[async_trait]
impl ChatBackend for DeepSeekBackend {
    fn id(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, InferenceError> {
        let response = self.send_request(messages, false).await?;

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| InferenceError::Parse(e.to_string()))?;

        let choice = chat_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| InferenceError::Parse("No choices in response".to_string()))?;

        Ok(choice.message.content.unwrap_or_default())
    }

    async fn complete_stream(
        &self,
        messages: &[ChatMessage],
        cancel: CancelToken,
    ) -> Result<FragmentStream, InferenceError> {
        // A non-success status fails the whole call before any fragment
        // is delivered.
        let response = self.send_request(messages, true).await?;

        let (sender, stream) = FragmentStream::channel(32);
        tokio::spawn(read_frames(response, sender, cancel));

        Ok(stream)
    }
}

/// Drive the byte stream until the `[DONE]` sentinel, cancellation, or EOF.
///
/// Dropping `response` releases the connection; dropping `sender` closes
/// the fragment stream normally, except mid-stream transport failures
/// which close it with the interruption mark set.
async fn read_frames(response: reqwest::Response, sender: FragmentSender, cancel: CancelToken) {
    let mut bytes = response.bytes_stream();
    // Bytes not yet decodable: a network chunk may end mid-codepoint.
    let mut pending: Vec<u8> = Vec::new();
    // Decoded text not yet line-terminated.
    let mut line_buffer = String::new();

    'read: loop {
        // Cancellation is checked before each read so a signalled token
        // never costs another round-trip.
        let chunk = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("stream cancelled by caller");
                break 'read;
            }
            chunk = bytes.next() => chunk,
        };

        let data = match chunk {
            Some(Ok(data)) => data,
            Some(Err(err)) => {
                warn!(error = %err, "transport failure mid-stream, closing");
                // Abnormal close: the consumer sees the mark after draining
                // and can tell this apart from [DONE] or cancellation.
                sender.abort();
                return;
            }
            None => break 'read,
        };

        pending.extend_from_slice(&data);
        let valid_up_to = match std::str::from_utf8(&pending) {
            Ok(_) => pending.len(),
            Err(err) => err.valid_up_to(),
        };
        let text = String::from_utf8_lossy(&pending[..valid_up_to]).into_owned();
        pending.drain(..valid_up_to);

        let (lines, rest) = sse::split_lines(std::mem::take(&mut line_buffer), &text);
        line_buffer = rest;

        for line in lines {
            match sse::decode_frame(&line) {
                Frame::Delta(delta) => {
                    if sender.send(delta).await.is_err() {
                        // Receiver went away; nothing left to deliver to.
                        break 'read;
                    }
                }
                Frame::Done => break 'read,
                Frame::Skip => {}
            }
        }
    }
}
