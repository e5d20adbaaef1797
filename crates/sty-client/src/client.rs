use std::io::Cursor;
use image::{DynamicImage, ImageFormat};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use sty_core::retry::TransportFailure;
use sty_core::{FluxParams, StyleModel, StyleParams};
use tracing::{debug, info, warn};
use crate::config::ClientConfig;
use crate::error::{ApiError, ApiErrorKind, problem_detail};

/// Decoded result of a styling call
#[derive(Debug, Clone)]
pub struct StyledImage {
    pub image: DynamicImage,
    /// Format the service delivered the image in
    pub format: ImageFormat,
}

/// Client for the styling service's two upload endpoints
#[derive(Debug, Clone)]
pub struct StyleClient {
    http: reqwest::Client,
    config: ClientConfig,
}

/// A response that made it back, before interpretation
struct RawResponse {
    status: u16,
    content_type: Option<String>,
    body: Vec<u8>,
}

impl StyleClient {
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ApiError::new(ApiErrorKind::UnknownError, e.to_string()))?;

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Restyle `image` with the style-transfer model
    pub async fn style_image(
        &self,
        image: &DynamicImage,
        params: StyleParams,
    ) -> Result<StyledImage, ApiError> {
        let mut fields = vec![
            ("prompt", params.prompt().to_string()),
            ("strength", params.strength().to_string()),
            ("inference_steps", params.inference_steps().to_string()),
            ("guidance_scale", params.guidance_scale().to_string()),
        ];
        if let Some(negative_prompt) = params.negative_prompt() {
            fields.push(("negative_prompt", negative_prompt.to_string()));
        }
        if let Some(seed) = params.seed() {
            fields.push(("seed", seed.to_string()));
        }

        self.submit(StyleModel::StyleTransfer, image, fields).await
    }

    /// Restyle `image` with the flux model
    pub async fn style_image_flux(
        &self,
        image: &DynamicImage,
        params: FluxParams,
    ) -> Result<StyledImage, ApiError> {
        let fields = vec![
            ("prompt", params.prompt().to_string()),
            ("aspect_ratio", params.aspect_ratio().to_string()),
        ];

        self.submit(StyleModel::Flux, image, fields).await
    }

    async fn submit(
        &self,
        model: StyleModel,
        image: &DynamicImage,
        fields: Vec<(&'static str, String)>,
    ) -> Result<StyledImage, ApiError> {
        let png = encode_png(image)?;
        let url = self.config.endpoint(model);
        info!("Sending {} request to {url} ({} bytes)", model, png.len());

        let (http, url, png, fields) = (&self.http, &url, &png, &fields);
        let response = self
            .config
            .retry
            .run("style", || async move {
                // multipart bodies are single-use; rebuild for every attempt
                let file = Part::bytes(png.clone())
                    .file_name("image.png")
                    .mime_str("image/png")
                    .map_err(|e| TransportFailure::from(&e))?;
                let form = fields
                    .iter()
                    .fold(Form::new().part("file", file), |form, (name, value)| {
                        form.text(*name, value.clone())
                    });

                let response = http
                    .post(url)
                    .header(ACCEPT, "image/jpeg")
                    .multipart(form)
                    .send()
                    .await
                    .map_err(|e| TransportFailure::from(&e))?;

                let status = response.status().as_u16();
                let content_type = response
                    .headers()
                    .get(CONTENT_TYPE)
                    .and_then(|value| value.to_str().ok())
                    .map(str::to_owned);
                let body = response.bytes().await.map_err(|e| TransportFailure::from(&e))?.to_vec();

                if status == 503 {
                    return Err(TransportFailure::http(status, String::from_utf8_lossy(&body)));
                }
                Ok(RawResponse { status, content_type, body })
            })
            .await?;

        debug!(
            status = response.status,
            content_type = ?response.content_type,
            "Response received"
        );
        decode_response(response)
    }
}

fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, ApiError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(ApiError::invalid_input("image is empty"));
    }

    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|e| ApiError::invalid_input(format!("could not encode image as PNG: {e}")))?;
    Ok(bytes)
}

fn decode_response(response: RawResponse) -> Result<StyledImage, ApiError> {
    let RawResponse { status, content_type, body } = response;
    if matches!(status, 401 | 403) {
        return Err(ApiError::from_status(status, &body));
    }

    let media_type = content_type
        .as_deref()
        .map(|value| value.split(';').next().unwrap_or_default().trim().to_ascii_lowercase());

    match media_type.as_deref() {
        Some("application/json" | "application/problem+json") => {
            if let Err(e) = serde_json::from_slice::<serde_json::Value>(&body) {
                let err = ApiError::new(ApiErrorKind::JsonError, e.to_string());
                return Err(err.with_status(status));
            }
            let detail = problem_detail(&body)
                .unwrap_or_else(|| "service answered with JSON instead of an image".into());
            Err(ApiError::new(ApiErrorKind::ServerError, detail).with_status(status))
        }
        _ if !(200..300).contains(&status) => Err(ApiError::from_status(status, &body)),
        Some(media_type) if media_type.starts_with("image/") => {
            decode_image(&body, ImageFormat::from_mime_type(media_type))
        }
        Some(other) => Err(ApiError::new(
            ApiErrorKind::UnknownError,
            format!("unexpected content type '{other}'"),
        )
        .with_status(status)),
        None => {
            warn!("Response has no content type; guessing the image format from its bytes");
            decode_image(&body, None)
        }
    }
}

fn decode_image(body: &[u8], format: Option<ImageFormat>) -> Result<StyledImage, ApiError> {
    let unknown = |message: String| ApiError::new(ApiErrorKind::UnknownError, message);
    let format = match format {
        Some(format) => format,
        None => image::guess_format(body)
            .map_err(|e| unknown(format!("unrecognized image data: {e}")))?,
    };
    let image = image::load_from_memory_with_format(body, format)
        .map_err(|e| unknown(format!("failed to decode image: {e}")))?;

    Ok(StyledImage { image, format })
}
