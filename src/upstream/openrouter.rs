//! OpenRouter streaming client
//!
//! Sends OpenAI-compatible chat completion requests with `stream: true` and
//! decodes the server-sent event body into [`CompletionChunk`]s.

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::stream::{self, Stream, StreamExt};
use reqwest::{StatusCode, header};
use serde::Deserialize;
use std::fmt;

use super::{ChatUpstream, ChunkStream, CompletionChunk, CompletionRequest, UpstreamErrorBody};
use crate::config::UpstreamConfig;
use crate::error::{AppError, AppResult};

/// Payload that terminates an OpenAI-style event stream
const DONE_SENTINEL: &str = "[DONE]";

/// Header carrying the calling site's URL (OpenRouter app attribution)
pub const REFERER_HEADER: &str = "HTTP-Referer";
/// Header carrying the calling site's display name
pub const TITLE_HEADER: &str = "X-Title";

/// Long-lived client for the OpenRouter chat completions API
///
/// Built once at startup and shared by all requests. The underlying
/// `reqwest::Client` pools connections and has no request timeout, so a
/// slow generation is never cut off by the relay.
#[derive(Debug, Clone)]
pub struct OpenRouterClient {
    http: reqwest::Client,
    config: UpstreamConfig,
}

impl OpenRouterClient {
    pub fn new(config: UpstreamConfig) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &UpstreamConfig {
        &self.config
    }
}

#[async_trait]
impl ChatUpstream for OpenRouterClient {
    async fn open_stream(&self, request: CompletionRequest) -> AppResult<ChunkStream> {
        let url = self.config.completions_url();

        tracing::debug!(
            url = %url,
            model = %request.model,
            messages_count = request.messages.len(),
            "Opening upstream completion stream"
        );

        let response = self
            .http
            .post(&url)
            .bearer_auth(self.config.api_key().expose())
            .header(REFERER_HEADER, self.config.site_url())
            .header(TITLE_HEADER, self.config.site_name())
            .header(header::ACCEPT, "text/event-stream")
            .json(&request)
            .send()
            .await
            .map_err(|e| AppError::UpstreamConnect(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => {
                    tracing::debug!(
                        status = %status,
                        error = %e,
                        "Failed to read upstream error body"
                    );
                    String::new()
                }
            };
            return Err(AppError::UpstreamStatus {
                status: status.as_u16(),
                message: error_message_from_body(&body, status),
            });
        }

        Ok(decode_event_stream(response.bytes_stream()))
    }
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: UpstreamErrorBody,
}

/// Extract a human-readable message from a non-success response body
///
/// Prefers the OpenAI-style `{"error": {"message": ...}}` envelope, then the
/// raw body text, then the status reason phrase.
fn error_message_from_body(body: &str, status: StatusCode) -> String {
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) {
        return envelope.error.message;
    }

    let trimmed = body.trim();
    if !trimmed.is_empty() {
        return trimmed.to_string();
    }

    status
        .canonical_reason()
        .unwrap_or("unknown error")
        .to_string()
}

/// Decode an SSE byte stream into completion chunks
///
/// The stream ends after `data: [DONE]`, at end of body, or right after the
/// first error item. Comment lines (OpenRouter's `: OPENROUTER PROCESSING`
/// keep-alives) never reach the caller.
pub fn decode_event_stream<S, B, E>(bytes: S) -> ChunkStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    let events = Box::pin(bytes.eventsource());

    stream::unfold(Some((events, 0usize)), |state| async move {
        let (mut events, mut fragments) = state?;

        loop {
            let event = match events.next().await {
                None => return None,
                Some(Ok(event)) => event,
                Some(Err(e)) => {
                    let error = AppError::UpstreamStream {
                        fragments,
                        reason: e.to_string(),
                    };
                    return Some((Err(error), None));
                }
            };

            let data = event.data.trim();
            if data.is_empty() {
                continue;
            }
            if data == DONE_SENTINEL {
                return None;
            }

            let mut chunk = match serde_json::from_str::<CompletionChunk>(data) {
                Ok(chunk) => chunk,
                Err(e) => return Some((Err(AppError::MalformedChunk(e.to_string())), None)),
            };

            if let Some(error) = chunk.error.take() {
                return Some((
                    Err(AppError::UpstreamReported {
                        message: error.message,
                    }),
                    None,
                ));
            }

            if chunk.text_delta().is_some() {
                fragments += 1;
            }
            return Some((Ok(chunk), Some((events, fragments))));
        }
    })
    .boxed()
}
