//! Chat request model and normalization

pub mod normalize;
pub mod types;

pub use normalize::{normalize_message, normalize_messages};
pub use types::{ChatMessage, ChatRequest, ContentPart, ImageUrl, MessageContent};
