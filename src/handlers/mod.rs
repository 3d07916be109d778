//! HTTP request handlers for the relay API

use crate::upstream::ChatUpstream;
use std::sync::Arc;

pub mod chat_stream;
pub mod extractor;
pub mod health;

/// Application state shared across all handlers
///
/// Holds the upstream client constructed at startup. Cloning is an `Arc`
/// bump; there is no mutable state shared between requests.
#[derive(Clone)]
pub struct AppState {
    upstream: Arc<dyn ChatUpstream>,
}

impl AppState {
    /// Create state around an already constructed upstream client
    pub fn new(upstream: Arc<dyn ChatUpstream>) -> Self {
        Self { upstream }
    }

    /// Get reference to the upstream client
    pub fn upstream(&self) -> &Arc<dyn ChatUpstream> {
        &self.upstream
    }
}
