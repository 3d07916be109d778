//! Chat request body extraction
//!
//! A body that cannot be decoded is answered here, before the handler runs,
//! so a bad request never opens an upstream connection.

use axum::{
    Json,
    extract::{FromRequest, Request, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Serialize, de::DeserializeOwned};

/// What was wrong with a refused body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyProblem {
    /// No `Content-Type: application/json`
    NotJson,
    /// Not parseable as JSON
    Malformed,
    /// Valid JSON that is not a chat request
    WrongShape,
    /// Anything else axum refuses (body read failure, size limit)
    Unreadable,
}

impl BodyProblem {
    fn of(rejection: &JsonRejection) -> Self {
        match rejection {
            JsonRejection::MissingJsonContentType(_) => Self::NotJson,
            JsonRejection::JsonSyntaxError(_) => Self::Malformed,
            JsonRejection::JsonDataError(_) => Self::WrongShape,
            _ => Self::Unreadable,
        }
    }

    pub fn status(self) -> StatusCode {
        match self {
            Self::NotJson => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::WrongShape => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Malformed | Self::Unreadable => StatusCode::BAD_REQUEST,
        }
    }

    fn code(self) -> &'static str {
        match self {
            Self::NotJson => "unsupported_media_type",
            Self::Malformed => "invalid_json",
            Self::WrongShape => "invalid_chat_request",
            Self::Unreadable => "unreadable_body",
        }
    }
}

/// Refused request body, rendered as `{"error": {message, type, param, code}}`
#[derive(Debug)]
pub struct BodyRejection {
    problem: BodyProblem,
    detail: String,
}

impl BodyRejection {
    pub fn problem(&self) -> BodyProblem {
        self.problem
    }

    pub fn message(&self) -> String {
        match self.problem {
            BodyProblem::NotJson => {
                "Chat requests must be sent with Content-Type: application/json".to_string()
            }
            BodyProblem::Malformed => format!("Request body is not valid JSON: {}", self.detail),
            BodyProblem::WrongShape => format!("Invalid chat request: {}", self.detail),
            BodyProblem::Unreadable => format!("Could not read request body: {}", self.detail),
        }
    }
}

impl From<JsonRejection> for BodyRejection {
    fn from(rejection: JsonRejection) -> Self {
        Self {
            problem: BodyProblem::of(&rejection),
            detail: rejection.body_text(),
        }
    }
}

#[derive(Serialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    message: String,
    #[serde(rename = "type")]
    kind: &'static str,
    param: Option<String>,
    code: &'static str,
}

impl IntoResponse for BodyRejection {
    fn into_response(self) -> Response {
        let status = self.problem.status();
        let message = self.message();
        tracing::debug!(status = %status, reason = %message, "Rejected chat request body");

        let envelope = ErrorEnvelope {
            error: ErrorDetail {
                message,
                kind: "invalid_request_error",
                param: None,
                code: self.problem.code(),
            },
        };
        (status, Json(envelope)).into_response()
    }
}

/// `Json<T>` in request position, refusing bad bodies with [`BodyRejection`]
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = BodyRejection;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(JsonBody(value))
    }
}
