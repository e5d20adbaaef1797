mod client;
#[cfg(test)]
pub(crate) mod fake;
mod schemas;

use async_trait::async_trait;
use crate::error::StyleError;
use crate::job::{JobHandle, OutputReference, PollUpdate};

pub use client::ReplicateClient;
pub use schemas::{PredictionRequest, PredictionResponse};

/// The three calls made against the remote prediction API.
///
/// Implementations apply the transport retry policy to each call on their own.
#[async_trait]
pub trait PredictionApi: Send + Sync {
    /// Create a prediction and return the locator to poll it by
    async fn submit(&self, request: &PredictionRequest) -> Result<JobHandle, StyleError>;

    /// Read the prediction's current status
    async fn poll(&self, handle: &JobHandle) -> Result<PollUpdate, StyleError>;

    /// Download the payload of a succeeded prediction
    async fn fetch_output(&self, output: &OutputReference) -> Result<Vec<u8>, StyleError>;
}
