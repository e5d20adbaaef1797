use std::fmt;
use serde::Deserialize;
use sty_core::ParamError;
use sty_core::retry::TransportFailure;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// Rejected before anything was sent
    InvalidInput,
    AuthError,
    /// The service answered with JSON that could not be parsed
    JsonError,
    NetworkError,
    ServerError,
    UnknownError,
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InvalidInput => "invalid input",
            Self::AuthError => "authentication error",
            Self::JsonError => "invalid JSON",
            Self::NetworkError => "network error",
            Self::ServerError => "server error",
            Self::UnknownError => "unknown error",
        };
        f.write_str(name)
    }
}

/// Failure of a styling call
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{kind}: {message}")]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub message: String,
    /// HTTP status of the response, when one arrived
    pub status: Option<u16>,
}

impl ApiError {
    pub fn new(kind: ApiErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::InvalidInput, message)
    }

    /// Map a non-success response onto an error, using the problem detail when present
    pub(crate) fn from_status(status: u16, body: &[u8]) -> Self {
        let message = problem_detail(body).unwrap_or_else(|| {
            let text = String::from_utf8_lossy(body);
            let text = sty_core::retry::snippet(&text);
            if text.is_empty() { format!("HTTP {status}") } else { text }
        });

        let kind = match status {
            401 | 403 => ApiErrorKind::AuthError,
            _ => ApiErrorKind::ServerError,
        };
        Self::new(kind, message).with_status(status)
    }
}

impl From<ParamError> for ApiError {
    fn from(err: ParamError) -> Self {
        Self::invalid_input(err.to_string())
    }
}

impl From<TransportFailure> for ApiError {
    /// Called once retries are spent
    fn from(failure: TransportFailure) -> Self {
        match failure.status {
            Some(status) => {
                let body = failure.body.as_deref().unwrap_or_default();
                Self::from_status(status, body.as_bytes())
            }
            None => Self::new(ApiErrorKind::NetworkError, failure.message),
        }
    }
}

/// Error body the service sends alongside a failure status
#[derive(Debug, Deserialize)]
struct ProblemBody {
    detail: Option<String>,
    error: Option<String>,
    title: Option<String>,
}

pub(crate) fn problem_detail(body: &[u8]) -> Option<String> {
    let problem: ProblemBody = serde_json::from_slice(body).ok()?;
    problem.detail.or(problem.error).or(problem.title)
}
