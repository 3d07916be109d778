//! Inbound chat request types
//!
//! These types describe what the frontend sends to `POST /chat/stream`.
//! Decoding is deliberately lenient inside `content` arrays: every part
//! decodes regardless of its `type`, and the normalizer decides what to keep.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Model used when the request does not name one
pub const DEFAULT_MODEL: &str = "openai/gpt-4o";

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

/// Body of a `POST /chat/stream` request
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatRequest {
    #[serde(default = "default_model")]
    model: String,
    messages: Vec<ChatMessage>,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
        }
    }

    /// Upstream model identifier, e.g. `openai/gpt-4o`
    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Split into model and messages
    pub fn into_parts(self) -> (String, Vec<ChatMessage>) {
        (self.model, self.messages)
    }
}

/// A single message in the conversation
///
/// `role` is free-form; whatever the frontend sends is forwarded.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn text(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: MessageContent::Text(content.into()),
        }
    }

    pub fn parts(role: impl Into<String>, parts: Vec<ContentPart>) -> Self {
        Self {
            role: role.into(),
            content: MessageContent::Parts(parts),
        }
    }
}

/// Message content: either a plain string or a list of parts
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// One element of an array-valued `content`
///
/// `kind` holds the raw `type` tag. Keys other than `type`, `text` and
/// `image_url` are accepted and discarded.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ContentPart {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<ImageUrl>,
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: "text".to_string(),
            text: Some(text.into()),
            image_url: None,
        }
    }

    pub fn image_url(url: impl Into<String>) -> Self {
        Self {
            kind: "image_url".to_string(),
            text: None,
            image_url: Some(ImageUrl {
                url: Some(url.into()),
                extra: Map::new(),
            }),
        }
    }
}

/// `image_url` object of an image part
///
/// Keys besides `url` (such as `detail`) are kept so the object can be
/// forwarded upstream unchanged.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ImageUrl {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ImageUrl {
    /// The URL if present and non-empty
    pub fn non_empty_url(&self) -> Option<&str> {
        self.url.as_deref().filter(|url| !url.is_empty())
    }
}
