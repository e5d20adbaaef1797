use std::sync::Arc;
use sty_core::{FluxParams, StyleModel, StyleParams};
use tokio_util::sync::CancellationToken;
use tracing::info;
use crate::config::PollConfig;
use crate::error::StyleError;
use crate::imaging;
use crate::polling::{cancellable, wait_for_output};
use crate::replicate::{PredictionApi, PredictionRequest};

/// Model-specific half of a request
#[derive(Debug, Clone, PartialEq)]
pub enum StyleJob {
    Transfer(StyleParams),
    Flux(FluxParams),
}

impl StyleJob {
    pub fn model(&self) -> StyleModel {
        match self {
            Self::Transfer(_) => StyleModel::StyleTransfer,
            Self::Flux(_) => StyleModel::Flux,
        }
    }

    fn prediction_request(&self, image_uri: String) -> PredictionRequest {
        match self {
            Self::Transfer(params) => PredictionRequest::style_transfer(image_uri, params),
            Self::Flux(params) => PredictionRequest::flux(image_uri, params),
        }
    }
}

/// One caller's image plus what to do with it
#[derive(Debug, Clone)]
pub struct StyleRequest {
    image: Vec<u8>,
    job: StyleJob,
}

impl StyleRequest {
    pub fn new(image: Option<Vec<u8>>, job: StyleJob) -> Result<Self, StyleError> {
        let image = image
            .filter(|bytes| !bytes.is_empty())
            .ok_or_else(|| StyleError::Validation("`file` and `prompt` are required".into()))?;
        Ok(Self { image, job })
    }

    pub fn job(&self) -> &StyleJob {
        &self.job
    }
}

/// Image in, styled image of the same size out
#[derive(Clone)]
pub struct StylePipeline {
    api: Arc<dyn PredictionApi>,
    poll: PollConfig,
}

impl StylePipeline {
    pub fn new(api: Arc<dyn PredictionApi>, poll: PollConfig) -> Self {
        Self { api, poll }
    }

    /// Run every stage in order; the first failure aborts the whole request.
    ///
    /// Each call submits a fresh remote job. Cancelling `cancel` abandons the
    /// job where it stands without touching it remotely.
    pub async fn run(
        &self,
        request: StyleRequest,
        cancel: &CancellationToken,
    ) -> Result<Vec<u8>, StyleError> {
        let StyleRequest { image, job } = request;
        let model = job.model();
        info!("Processing {} request ({} bytes)", model, image.len());

        let bound = model.working_bound();
        let prepared = blocking(move || imaging::prepare_input(&image, bound)).await?;
        let (width, height) = (prepared.original_width, prepared.original_height);
        info!("Original image size: {width}x{height}");

        let prediction = job.prediction_request(prepared.data_uri());
        drop(prepared);

        let handle = cancellable(cancel, self.api.submit(&prediction)).await??;
        info!(status_url = %handle.status_url, "Prediction submitted");

        let output = wait_for_output(self.api.as_ref(), handle, &self.poll, cancel).await?;
        let output_bytes = cancellable(cancel, self.api.fetch_output(&output)).await??;
        info!("Fetched {} output bytes", output_bytes.len());

        let styled = blocking(move || imaging::resize_to(&output_bytes, width, height)).await?;
        info!("Successfully processed {} request", model);
        Ok(styled)
    }
}

/// Run CPU-bound image work off the async workers
async fn blocking<T, F>(work: F) -> Result<T, StyleError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, StyleError> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| StyleError::Encode(format!("image task failed: {e}")))?
}
