use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum P2pError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unable to bind the peer endpoint: {0}")]
    Bind(#[from] std::io::Error),

    #[error("registry rejected the request: {0}")]
    RegistryRejected(StatusCode),

    #[error("peer rejected the value query: {0}")]
    QueryRejected(StatusCode),

    #[error("peer returned an empty value")]
    EmptyValue,
}

/// Rejection of an inbound value query.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("index {index} is out of range for a sequence of {len} blocks")]
    OutOfRange { index: i64, len: usize },
}

impl IntoResponse for QueryError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": self.to_string()
        });
        (StatusCode::BAD_REQUEST, axum::Json(body)).into_response()
    }
}
