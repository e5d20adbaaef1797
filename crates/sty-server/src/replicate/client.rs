use async_trait::async_trait;
use reqwest::Response;
use serde::de::DeserializeOwned;
use sty_core::RetryPolicy;
use sty_core::retry::TransportFailure;
use tracing::debug;
use crate::config::ServerConfig;
use crate::error::StyleError;
use crate::job::{JobHandle, OutputReference, PollUpdate};
use crate::replicate::PredictionApi;
use crate::replicate::schemas::{PredictionRequest, PredictionResponse};

/// `reqwest`-backed client for a Replicate-style predictions API
#[derive(Clone)]
pub struct ReplicateClient {
    http: reqwest::Client,
    api_base: String,
    api_token: String,
    retry: RetryPolicy,
}

impl ReplicateClient {
    pub fn new(config: &ServerConfig) -> Result<Self, StyleError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn predictions_endpoint(&self) -> String {
        format!("{}/predictions", self.api_base)
    }
}

/// Turn a non-success status into a transport failure, keeping a body snippet
async fn check_status(response: Response) -> Result<Response, StyleError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(StyleError::Network(TransportFailure::http(status.as_u16(), body)))
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, StyleError> {
    let body = check_status(response).await?.text().await?;
    serde_json::from_str(&body)
        .map_err(|e| StyleError::Protocol(format!("{e}: {}", sty_core::retry::snippet(&body))))
}

#[async_trait]
impl PredictionApi for ReplicateClient {
    async fn submit(&self, request: &PredictionRequest) -> Result<JobHandle, StyleError> {
        let url = self.predictions_endpoint();
        let (http, url, token) = (&self.http, &url, &self.api_token);

        let body = serde_json::to_string(request).map_err(|e| StyleError::Encode(e.to_string()))?;
        debug!("Request payload size: {} characters", body.len());

        let response: PredictionResponse = self
            .retry
            .run("submit", || {
                let body = body.clone();
                async move {
                    let response = http
                        .post(url)
                        .bearer_auth(token)
                        .header(reqwest::header::CONTENT_TYPE, "application/json")
                        .body(body)
                        .send()
                        .await?;
                    read_json(response).await
                }
            })
            .await?;

        response.into_handle()
    }

    async fn poll(&self, handle: &JobHandle) -> Result<PollUpdate, StyleError> {
        let (http, url, token) = (&self.http, &handle.status_url, &self.api_token);

        let response: PredictionResponse = self
            .retry
            .run("poll", || async move {
                let response = http.get(url).bearer_auth(token).send().await?;
                read_json(response).await
            })
            .await?;

        response.into_update()
    }

    async fn fetch_output(&self, output: &OutputReference) -> Result<Vec<u8>, StyleError> {
        let url = match output {
            OutputReference::Inline(bytes) => return Ok(bytes.clone()),
            OutputReference::Url(url) => url,
        };
        let http = &self.http;

        // Delivery URLs are public; the API token is not sent to them.
        self.retry
            .run("fetch_output", || async move {
                let response = check_status(http.get(url).send().await?).await?;
                Ok(response.bytes().await?.to_vec())
            })
            .await
    }
}
