//! Streaming chat relay handler
//!
//! Handles `POST /chat/stream`: normalizes the conversation, opens one
//! streaming completion upstream and forwards each text delta to the client
//! as soon as it arrives, as a plain-text body.
//!
//! Once the handler returns, the status line is already `200 OK`, so
//! upstream failures can no longer change it. They are appended to the body
//! instead:
//!
//! ```text
//! Partial answer...
//!
//! [ERROR: Upstream returned 429: Rate limit exceeded]
//! ```

use axum::{
    Extension,
    body::Body,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use std::convert::Infallible;
use std::sync::Arc;

use crate::chat::{ChatRequest, normalize_messages};
use crate::error::AppError;
use crate::handlers::AppState;
use crate::handlers::extractor::JsonBody;
use crate::middleware::RequestId;
use crate::upstream::{ChatUpstream, ChunkStream, CompletionRequest};

/// Content type of the relayed body
pub const CONTENT_TYPE_TEXT: &str = "text/plain; charset=utf-8";

/// POST /chat/stream handler
pub async fn handler(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    JsonBody(request): JsonBody<ChatRequest>,
) -> Response {
    tracing::debug!(
        request_id = %request_id,
        model = %request.model(),
        messages_count = request.messages().len(),
        "Received chat stream request"
    );

    let messages = normalize_messages(request.messages());
    let (model, _) = request.into_parts();
    let completion = CompletionRequest::streaming(model, messages);

    let stream = relay_stream(state.upstream().clone(), completion, request_id);

    (
        [
            (header::CONTENT_TYPE, CONTENT_TYPE_TEXT),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(stream),
    )
        .into_response()
}

/// Text appended to the body when the upstream fails
pub fn error_marker(error: &AppError) -> String {
    format!("\n\n[ERROR: {}]", error)
}

/// Build the outgoing body stream for one completion call
///
/// The upstream call is only started when the body is first polled. The
/// returned stream owns the upstream connection: dropping it (which hyper
/// does when the client goes away) cancels the upstream call.
pub fn relay_stream(
    upstream: Arc<dyn ChatUpstream>,
    request: CompletionRequest,
    request_id: RequestId,
) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
    stream::once(async move {
        let mut guard = RelayGuard::new(request_id);
        let model = request.model.clone();

        match upstream.open_stream(request).await {
            Ok(chunks) => {
                tracing::info!(
                    request_id = %request_id,
                    model = %model,
                    "Upstream stream opened"
                );
                forward_chunks(chunks, guard).boxed()
            }
            Err(error) => {
                guard.fail(&error);
                stream::iter([Ok(Bytes::from(error_marker(&error)))]).boxed()
            }
        }
    })
    .flatten()
}

/// Forward text deltas until the upstream ends or fails
fn forward_chunks(
    chunks: ChunkStream,
    guard: RelayGuard,
) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
    stream::unfold(Some((chunks, guard)), |state| async move {
        let (mut chunks, mut guard) = state?;

        loop {
            match chunks.next().await {
                Some(Ok(chunk)) => {
                    let Some(text) = chunk.into_text_delta().filter(|text| !text.is_empty())
                    else {
                        continue;
                    };
                    guard.record(&text);
                    return Some((Ok(Bytes::from(text)), Some((chunks, guard))));
                }
                Some(Err(error)) => {
                    guard.fail(&error);
                    return Some((Ok(Bytes::from(error_marker(&error))), None));
                }
                None => {
                    guard.finish();
                    return None;
                }
            }
        }
    })
}

/// Per-stream bookkeeping
///
/// Logs the outcome of the relay exactly once. If it is dropped before the
/// upstream finished, the client disconnected and the upstream stream is
/// being torn down with it.
struct RelayGuard {
    request_id: RequestId,
    fragments: usize,
    bytes: usize,
    completed: bool,
}

impl RelayGuard {
    fn new(request_id: RequestId) -> Self {
        Self {
            request_id,
            fragments: 0,
            bytes: 0,
            completed: false,
        }
    }

    fn record(&mut self, text: &str) {
        self.fragments += 1;
        self.bytes += text.len();
    }

    fn finish(&mut self) {
        self.completed = true;
        tracing::info!(
            request_id = %self.request_id,
            fragments = self.fragments,
            bytes = self.bytes,
            "Upstream stream completed"
        );
    }

    fn fail(&mut self, error: &AppError) {
        self.completed = true;
        if error.is_upstream() {
            tracing::error!(
                request_id = %self.request_id,
                fragments = self.fragments,
                bytes = self.bytes,
                error = %error,
                "Error during streaming"
            );
        } else {
            tracing::error!(
                request_id = %self.request_id,
                error = %error,
                "Relay failed before streaming"
            );
        }
    }
}

impl Drop for RelayGuard {
    fn drop(&mut self) {
        if !self.completed {
            tracing::warn!(
                request_id = %self.request_id,
                fragments = self.fragments,
                bytes = self.bytes,
                "Client disconnected before upstream completed, cancelling upstream stream"
            );
        }
    }
}
