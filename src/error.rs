//! Error handling for VAR Refserver

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed ingress frame (drop the frame, keep the stream alive)
    #[error("Decode error: {0}")]
    Decode(String),

    /// Analyzer call failed (treat as "no annotation this frame")
    #[error("Analyzer error: {0}")]
    Analyzer(String),

    /// Verdict service unreachable or returned an error
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Verdict service polling exceeded its bound
    #[error("Service timeout: {0}")]
    ServiceTimeout(String),

    /// Review requested before enough frames were buffered
    #[error("Buffer empty: {0} frames buffered, {1} required")]
    BufferEmpty(usize, usize),

    /// Verdict payload violated the expected schema
    #[error("Parse error: {0}")]
    Parse(String),

    /// Clip muxing failed
    #[error("Clip error: {0}")]
    Clip(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self {
            Error::Decode(msg) => (StatusCode::BAD_REQUEST, "DECODE_ERROR", msg.clone()),
            Error::Analyzer(msg) => (StatusCode::BAD_GATEWAY, "ANALYZER_ERROR", msg.clone()),
            Error::ServiceUnavailable(msg) => (
                StatusCode::BAD_GATEWAY,
                "SERVICE_UNAVAILABLE",
                msg.clone(),
            ),
            Error::ServiceTimeout(msg) => (
                StatusCode::GATEWAY_TIMEOUT,
                "SERVICE_TIMEOUT",
                msg.clone(),
            ),
            Error::BufferEmpty(have, need) => (
                StatusCode::CONFLICT,
                "BUFFER_EMPTY",
                format!("{} frames buffered, {} required", have, need),
            ),
            Error::Parse(msg) => (StatusCode::BAD_GATEWAY, "PARSE_ERROR", msg.clone()),
            Error::Clip(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "CLIP_ERROR",
                msg.clone(),
            ),
            Error::Serialization(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "SERIALIZATION_ERROR",
                e.to_string(),
            ),
            Error::Http(e) => (StatusCode::BAD_GATEWAY, "HTTP_ERROR", e.to_string()),
            Error::Io(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "IO_ERROR",
                e.to_string(),
            ),
            Error::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg.clone(),
            ),
        };

        tracing::error!(
            status = %status,
            error_code = %error_code,
            message = %message,
            "Request error"
        );

        let body = Json(json!({
            "error_code": error_code,
            "message": message
        }));

        (status, body).into_response()
    }
}
