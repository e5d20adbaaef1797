use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use sty_core::{FluxParams, StyleModel, StyleParams};
use crate::error::StyleError;
use crate::imaging;
use crate::job::{JobHandle, JobStatus, OutputReference, PollUpdate};

/// Body of `POST /predictions`
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PredictionRequest {
    pub version: String,
    pub input: Map<String, Value>,
}

impl PredictionRequest {
    pub fn style_transfer(image_uri: String, params: &StyleParams) -> Self {
        let mut input = Map::new();
        input.insert("prompt".into(), json!(params.prompt()));
        input.insert("image".into(), json!(image_uri));
        input.insert("prompt_strength".into(), decimal(params.strength()));
        input.insert("num_inference_steps".into(), json!(params.inference_steps()));
        input.insert("guidance_scale".into(), decimal(params.guidance_scale()));
        input.insert("negative_prompt".into(), json!(params.effective_negative_prompt()));
        if let Some(seed) = params.seed() {
            input.insert("seed".into(), json!(seed));
        }

        Self {
            version: StyleModel::StyleTransfer.version().to_string(),
            input,
        }
    }

    pub fn flux(image_uri: String, params: &FluxParams) -> Self {
        let mut input = Map::new();
        input.insert("prompt".into(), json!(params.prompt()));
        input.insert("input_image".into(), json!(image_uri));
        input.insert("aspect_ratio".into(), json!(params.aspect_ratio().to_string()));

        Self {
            version: StyleModel::Flux.version().to_string(),
            input,
        }
    }
}

/// `f32` as the shortest decimal that reads back to it, so 0.8 is sent as 0.8
fn decimal(value: f32) -> Value {
    json!(value.to_string().parse::<f64>().unwrap_or(f64::from(value)))
}

#[derive(Debug, Clone, Deserialize, PartialEq, Default)]
pub struct PredictionUrls {
    pub get: Option<String>,
}

/// Prediction object returned by both submission and polling
#[derive(Debug, Clone, Deserialize, PartialEq, Default)]
pub struct PredictionResponse {
    pub id: Option<String>,
    pub status: Option<JobStatus>,
    pub urls: Option<PredictionUrls>,
    #[serde(default)]
    pub output: Value,
    #[serde(default)]
    pub error: Value,
    pub logs: Option<String>,
}

impl PredictionResponse {
    pub fn into_handle(self) -> Result<JobHandle, StyleError> {
        let status_url = self
            .urls
            .and_then(|urls| urls.get)
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .ok_or_else(|| StyleError::Protocol("submission response has no urls.get".into()))?;

        Ok(JobHandle {
            id: self.id,
            status_url,
        })
    }

    pub fn into_update(self) -> Result<PollUpdate, StyleError> {
        let status = self
            .status
            .ok_or_else(|| StyleError::Protocol("status response has no status".into()))?;

        Ok(PollUpdate {
            status,
            output: resolve_output(&self.output),
            error: error_text(&self.error),
            last_log_line: self.logs.as_deref().and_then(last_log_line),
        })
    }
}

/// First usable output; arrays are resolved to their first element
pub fn resolve_output(output: &Value) -> Option<OutputReference> {
    let first = match output {
        Value::Array(items) => items.first()?,
        other => other,
    };
    let text = first.as_str()?.trim();
    if text.is_empty() {
        return None;
    }
    if text.starts_with("data:") {
        return imaging::from_data_uri(text).map(OutputReference::Inline);
    }
    Some(OutputReference::Url(text.to_string()))
}

fn error_text(error: &Value) -> Option<String> {
    match error {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn last_log_line(logs: &str) -> Option<String> {
    logs.lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}
