//! Error types for the relay
//!
//! All errors implement `IntoResponse` for Axum handlers. Inside an open
//! relay stream the `Display` text is what the client sees instead.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to read config file {path}: {source}")]
    ConfigFileRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ConfigParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration in {path}: {reason}")]
    ConfigValidationFailed { path: String, reason: String },

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Failed to connect to upstream: {0}")]
    UpstreamConnect(String),

    #[error("Upstream returned {status}: {message}")]
    UpstreamStatus { status: u16, message: String },

    #[error("Upstream stream interrupted after {fragments} fragments: {reason}")]
    UpstreamStream { fragments: usize, reason: String },

    #[error("Malformed upstream chunk: {0}")]
    MalformedChunk(String),

    #[error("Upstream error: {message}")]
    UpstreamReported { message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether the error originated on the upstream side of the relay
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Self::UpstreamConnect(_)
                | Self::UpstreamStatus { .. }
                | Self::UpstreamStream { .. }
                | Self::MalformedChunk(_)
                | Self::UpstreamReported { .. }
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            Self::Config(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            Self::ConfigFileRead { .. }
            | Self::ConfigParseFailed { .. }
            | Self::ConfigValidationFailed { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            Self::UpstreamConnect(_)
            | Self::UpstreamStatus { .. }
            | Self::UpstreamStream { .. }
            | Self::MalformedChunk(_)
            | Self::UpstreamReported { .. } => (StatusCode::BAD_GATEWAY, self.to_string()),
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = Json(serde_json::json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}

/// Convenience type alias for Results
pub type AppResult<T> = Result<T, AppError>;
