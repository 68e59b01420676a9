use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

/// Failures surfaced to the webhook caller.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let body = json!({
            "status": "error",
            "message": self.to_string(),
        });
        (self.status(), Json(body)).into_response()
    }
}
