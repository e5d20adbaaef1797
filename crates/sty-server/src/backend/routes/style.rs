use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{Multipart, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use sty_core::{AspectRatio, FluxParams, StyleModel, StyleParams};
use tracing::{Instrument, info_span, warn};
use uuid::Uuid;
use crate::backend::schemas::Problem;
use crate::backend::state::AppState;
use crate::error::StyleError;
use crate::pipeline::{StyleJob, StyleRequest};

pub async fn style_transfer(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, Problem> {
    handle(state, StyleModel::StyleTransfer, headers, multipart).await
}

pub async fn style_flux(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, Problem> {
    handle(state, StyleModel::Flux, headers, multipart).await
}

async fn handle(
    state: Arc<AppState>,
    model: StyleModel,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, Problem> {
    let span = info_span!("style_request", request_id = %Uuid::new_v4(), model = model.id());

    async move {
        if !accepts_jpeg(&headers) {
            return Err(Problem::new(
                StatusCode::NOT_ACCEPTABLE,
                "not-acceptable",
                "responses are only available as image/jpeg",
            ));
        }

        let multipart = multipart.map_err(|rejection| {
            Problem::new(rejection.status(), "validation", rejection.body_text())
        })?;
        let request = StyleForm::read(multipart).await?.into_request(model)?;

        let cancel = state.request_token();
        let styled = state.pipeline().run(request, &cancel).await?;

        Ok(([(header::CONTENT_TYPE, "image/jpeg")], styled).into_response())
    }
    .instrument(span)
    .await
}

/// Whether the caller's `Accept` header admits a JPEG body. No header admits anything.
fn accepts_jpeg(headers: &HeaderMap) -> bool {
    let mut values = headers.get_all(header::ACCEPT).iter().peekable();
    if values.peek().is_none() {
        return true;
    }

    values
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(|range| range.split(';').next().unwrap_or_default().trim().to_ascii_lowercase())
        .any(|range| matches!(range.as_str(), "image/jpeg" | "image/*" | "*/*"))
}

fn upload_problem(err: MultipartError) -> Problem {
    Problem::new(err.status(), "validation", err.body_text())
}

/// Raw multipart fields, before validation
#[derive(Debug, Default)]
struct StyleForm {
    file: Option<Vec<u8>>,
    fields: HashMap<String, String>,
}

impl StyleForm {
    async fn read(mut multipart: Multipart) -> Result<Self, Problem> {
        let mut form = Self::default();

        while let Some(field) = multipart.next_field().await.map_err(upload_problem)? {
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };
            if name == "file" {
                form.file = Some(field.bytes().await.map_err(upload_problem)?.to_vec());
            } else {
                let value = field.text().await.map_err(upload_problem)?;
                form.fields.insert(name, value);
            }
        }

        Ok(form)
    }

    fn text(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    /// Optional numeric field; anything unparseable counts as absent
    fn number<T: FromStr>(&self, name: &str) -> Option<T> {
        let raw = self.text(name)?;
        match raw.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring unparseable {name} '{raw}', using default");
                None
            }
        }
    }

    fn style_params(&self) -> Result<StyleParams, StyleError> {
        let mut params = StyleParams::new(self.text("prompt").unwrap_or_default())?
            .with_negative_prompt(self.text("negative_prompt").map(str::to_owned))
            .with_seed(self.number("seed"));

        if let Some(strength) = self.number("strength") {
            params = params.with_strength(strength);
        }
        if let Some(steps) = self.number::<i64>("inference_steps") {
            params = params.with_inference_steps(steps.clamp(0, i64::from(u32::MAX)) as u32);
        }
        if let Some(guidance_scale) = self.number("guidance_scale") {
            params = params.with_guidance_scale(guidance_scale);
        }

        Ok(params)
    }

    fn flux_params(&self) -> Result<FluxParams, StyleError> {
        let aspect_ratio = self
            .text("aspect_ratio")
            .map(AspectRatio::parse)
            .transpose()?
            .unwrap_or_default();

        Ok(FluxParams::new(self.text("prompt").unwrap_or_default(), aspect_ratio)?)
    }

    fn into_request(self, model: StyleModel) -> Result<StyleRequest, StyleError> {
        let job = match model {
            StyleModel::StyleTransfer => StyleJob::Transfer(self.style_params()?),
            StyleModel::Flux => StyleJob::Flux(self.flux_params()?),
        };
        StyleRequest::new(self.file, job)
    }
}
