//! Upstream chat-completion API
//!
//! [`ChatUpstream`] is the seam between the relay handler and the provider.
//! Production wiring uses [`openrouter::OpenRouterClient`]; tests plug in a
//! scripted implementation.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::chat::ImageUrl;
use crate::error::AppResult;

pub mod openrouter;

pub use openrouter::OpenRouterClient;

/// Lazy, single-pass sequence of parsed upstream chunks
///
/// Dropping the stream releases the underlying connection.
pub type ChunkStream = BoxStream<'static, AppResult<CompletionChunk>>;

/// A streaming chat-completion provider
#[async_trait]
pub trait ChatUpstream: Send + Sync {
    /// Open one streaming completion call
    ///
    /// Errors returned here happened before the first chunk (connection
    /// failure, non-success status). Errors after that arrive as items of
    /// the returned stream.
    async fn open_stream(&self, request: CompletionRequest) -> AppResult<ChunkStream>;
}

/// Request body for `POST {base_url}/chat/completions`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<UpstreamMessage>,
    pub stream: bool,
}

impl CompletionRequest {
    /// Build a streaming request
    pub fn streaming(model: impl Into<String>, messages: Vec<UpstreamMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            stream: true,
        }
    }
}

/// A message in the upstream (OpenAI) shape
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpstreamMessage {
    pub role: String,
    pub content: UpstreamContent,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum UpstreamContent {
    Text(String),
    Parts(Vec<UpstreamPart>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UpstreamPart {
    /// `text` is sent as `null` when the inbound part had none
    Text { text: Option<String> },
    ImageUrl { image_url: ImageUrl },
}

/// One `data:` payload of the upstream event stream
///
/// Only the fields the relay reads are modelled; everything else is ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CompletionChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
    /// OpenRouter reports failures after the stream started in-band
    #[serde(default)]
    pub error: Option<UpstreamErrorBody>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: Option<ChunkDelta>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ChunkDelta {
    #[serde(default)]
    pub content: Option<String>,
}

/// OpenAI-style error object, `{"message": "...", "code": ...}`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UpstreamErrorBody {
    pub message: String,
    #[serde(default)]
    pub code: Option<serde_json::Value>,
}

impl CompletionChunk {
    /// Chunk carrying a single text delta
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            choices: vec![ChunkChoice {
                delta: Some(ChunkDelta {
                    content: Some(content.into()),
                }),
                finish_reason: None,
            }],
            error: None,
        }
    }

    /// Text delta of the first choice, if any
    pub fn text_delta(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|choice| choice.delta.as_ref())
            .and_then(|delta| delta.content.as_deref())
    }

    /// Move the text delta out of the chunk
    pub fn into_text_delta(self) -> Option<String> {
        self.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta)
            .and_then(|delta| delta.content)
    }
}
