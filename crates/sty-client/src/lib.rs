//! Client for the image-styling service.
//!
//! Uploads an image and prompt as multipart form data, waits for the styled
//! image and decodes it. Transient connectivity failures and `503` responses
//! are retried with the same policy the service applies to its own calls.

mod client;
mod config;
mod error;

pub use client::{StyleClient, StyledImage};
pub use config::{ClientConfig, DEFAULT_BASE_ENDPOINT, DEFAULT_TIMEOUT};
pub use error::{ApiError, ApiErrorKind};
pub use sty_core::{AspectRatio, FluxParams, RetryPolicy, StyleModel, StyleParams};
