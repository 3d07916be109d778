//! Message normalization
//!
//! Reshapes inbound [`ChatMessage`]s into the message format of the
//! OpenAI-compatible upstream. Content parts the upstream would not
//! understand are dropped instead of failing the request.

use crate::chat::types::{ChatMessage, ContentPart, MessageContent};
use crate::upstream::{UpstreamContent, UpstreamMessage, UpstreamPart};

/// Normalize a conversation, preserving message order and roles
pub fn normalize_messages(messages: &[ChatMessage]) -> Vec<UpstreamMessage> {
    messages.iter().map(normalize_message).collect()
}

/// Normalize a single message
pub fn normalize_message(message: &ChatMessage) -> UpstreamMessage {
    let content = match &message.content {
        MessageContent::Text(text) => UpstreamContent::Text(text.clone()),
        MessageContent::Parts(parts) => {
            UpstreamContent::Parts(parts.iter().filter_map(normalize_part).collect())
        }
    };

    UpstreamMessage {
        role: message.role.clone(),
        content,
    }
}

/// Convert one content part, or `None` if it must be dropped
///
/// Kept: every `text` part, `image_url` parts with a non-empty URL.
fn normalize_part(part: &ContentPart) -> Option<UpstreamPart> {
    match part.kind.as_str() {
        "text" => Some(UpstreamPart::Text {
            text: part.text.clone(),
        }),
        "image_url" => match &part.image_url {
            Some(image_url) if image_url.non_empty_url().is_some() => Some(UpstreamPart::ImageUrl {
                image_url: image_url.clone(),
            }),
            _ => {
                tracing::debug!("Dropping image_url part without a url");
                None
            }
        },
        other => {
            tracing::debug!(part_type = %other, "Dropping content part of unsupported type");
            None
        }
    }
}
