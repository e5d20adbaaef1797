use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use crate::config::ServerConfig;
use crate::pipeline::StylePipeline;
use crate::replicate::PredictionApi;

/// Shared by every request; immutable after startup
pub struct AppState {
    pipeline: StylePipeline,
    config: ServerConfig,
    shutdown: CancellationToken,
}

impl AppState {
    pub fn new(
        config: ServerConfig,
        api: Arc<dyn PredictionApi>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            pipeline: StylePipeline::new(api, config.poll),
            config,
            shutdown,
        }
    }

    pub fn pipeline(&self) -> &StylePipeline {
        &self.pipeline
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Token for one request, cancelled when the server shuts down
    pub fn request_token(&self) -> CancellationToken {
        self.shutdown.child_token()
    }
}
