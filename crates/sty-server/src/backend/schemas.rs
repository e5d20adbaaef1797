use axum::http::{StatusCode, header};
use axum::Json;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};
use crate::error::StyleError;

pub const PROBLEM_CONTENT_TYPE: &str = "application/problem+json";

/// Error body returned by every route
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Problem {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub status: u16,
    pub detail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_status: Option<u16>,
}

impl Problem {
    pub fn new(status: StatusCode, kind: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            title: status.canonical_reason().unwrap_or("Error").to_string(),
            status: status.as_u16(),
            detail: detail.into(),
            remote_status: None,
        }
    }

    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

impl From<&StyleError> for Problem {
    fn from(err: &StyleError) -> Self {
        Self {
            remote_status: err.remote_status(),
            ..Self::new(err.status_code(), err.kind(), err.to_string())
        }
    }
}

impl From<StyleError> for Problem {
    fn from(err: StyleError) -> Self {
        if err.status_code().is_client_error() {
            warn!(kind = err.kind(), "Rejected request: {err}");
        } else {
            error!(kind = err.kind(), "Error processing request: {err}");
        }
        Self::from(&err)
    }
}

impl IntoResponse for Problem {
    fn into_response(self) -> Response {
        (
            self.status_code(),
            [(header::CONTENT_TYPE, PROBLEM_CONTENT_TYPE)],
            Json(self),
        )
            .into_response()
    }
}

impl IntoResponse for StyleError {
    fn into_response(self) -> Response {
        Problem::from(self).into_response()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    pub status: String,
}
