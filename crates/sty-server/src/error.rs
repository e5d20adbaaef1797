use std::time::Duration;
use axum::http::StatusCode;
use sty_core::ParamError;
use sty_core::retry::{AsTransportFailure, TransportFailure};
use thiserror::Error;

/// Every way a styling request can end without an image
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StyleError {
    #[error("{0}")]
    Validation(String),

    #[error("Unexpected response from prediction API: {0}")]
    Protocol(String),

    #[error("Prediction failed: {0}")]
    RemoteJobFailed(String),

    #[error("Prediction was canceled")]
    RemoteJobCanceled,

    #[error(
        "Prediction timed out after {} seconds. The model may be experiencing high demand.",
        .elapsed.as_secs()
    )]
    TimedOut { elapsed: Duration },

    #[error("Prediction API request failed: {0}")]
    Network(TransportFailure),

    #[error("Could not decode image: {0}")]
    Decode(String),

    #[error("Could not encode image: {0}")]
    Encode(String),

    #[error("Request was canceled")]
    Canceled,
}

impl StyleError {
    /// Status returned to the inbound caller
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::Decode(_) => StatusCode::BAD_REQUEST,
            Self::Protocol(_)
            | Self::RemoteJobFailed(_)
            | Self::RemoteJobCanceled
            | Self::Network(_) => StatusCode::BAD_GATEWAY,
            Self::TimedOut { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::Canceled => StatusCode::SERVICE_UNAVAILABLE,
            Self::Encode(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Status code reported by the prediction API, when there was one
    pub fn remote_status(&self) -> Option<u16> {
        match self {
            Self::Network(failure) => failure.status,
            _ => None,
        }
    }

    /// Short machine-readable name, used as the problem `type`
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Protocol(_) => "protocol",
            Self::RemoteJobFailed(_) => "remote-job-failed",
            Self::RemoteJobCanceled => "remote-job-canceled",
            Self::TimedOut { .. } => "timed-out",
            Self::Network(_) => "network",
            Self::Decode(_) => "decode",
            Self::Encode(_) => "encode",
            Self::Canceled => "canceled",
        }
    }
}

impl AsTransportFailure for StyleError {
    fn transport_failure(&self) -> Option<&TransportFailure> {
        match self {
            Self::Network(failure) => Some(failure),
            _ => None,
        }
    }
}

impl From<ParamError> for StyleError {
    fn from(err: ParamError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<reqwest::Error> for StyleError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(TransportFailure::from(&err))
    }
}
