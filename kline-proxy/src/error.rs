use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Body returned when no upstream produced a usable response
pub const UPSTREAM_FAILED_BODY: &str = r#"{"error":"upstream failed"}"#;

pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("upstream transport error: {0}")]
    Transport(String),

    #[error("upstream returned status {0}")]
    Status(u16),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<reqwest::Error> for ProxyError {
    fn from(error: reqwest::Error) -> Self {
        match error.status() {
            Some(status) => ProxyError::Status(status.as_u16()),
            None => ProxyError::Transport(error.to_string()),
        }
    }
}

/// Clients only ever see the fixed 502 payload; details stay in the logs
impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (
            StatusCode::BAD_GATEWAY,
            [
                (header::CONTENT_TYPE, JSON_CONTENT_TYPE),
                (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
            ],
            UPSTREAM_FAILED_BODY,
        )
            .into_response()
    }
}
