//! Decode, fit and re-encode images around the remote call.

use std::io::Cursor;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader};
use tracing::info;
use crate::error::StyleError;

/// Largest `(w, h)` with the source aspect ratio that fits inside the bound.
///
/// `ratio = min(max_w / w, max_h / h)`, each side rounded and kept at least 1.
/// The ratio may exceed 1; callers decide whether scaling up is wanted.
pub fn fit_dimensions(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    let ratio = f64::min(
        max_width as f64 / width.max(1) as f64,
        max_height as f64 / height.max(1) as f64,
    );
    let w = (width as f64 * ratio).round().max(1.0) as u32;
    let h = (height as f64 * ratio).round().max(1.0) as u32;
    (w.min(max_width.max(1)), h.min(max_height.max(1)))
}

/// Input image ready for upload
#[derive(Debug, Clone)]
pub struct PreparedImage {
    pub bytes: Vec<u8>,
    pub mime: &'static str,
    pub original_width: u32,
    pub original_height: u32,
    /// False when the original bytes were passed through untouched
    pub resized: bool,
}

impl PreparedImage {
    pub fn data_uri(&self) -> String {
        to_data_uri(&self.bytes, self.mime)
    }
}

pub fn to_data_uri(bytes: &[u8], mime: &str) -> String {
    format!("data:{mime};base64,{}", STANDARD.encode(bytes))
}

/// Bytes of a `data:<mime>;base64,<payload>` URI
pub fn from_data_uri(uri: &str) -> Option<Vec<u8>> {
    let rest = uri.strip_prefix("data:")?;
    let (meta, payload) = rest.split_once(',')?;
    if !meta.ends_with(";base64") {
        return None;
    }
    STANDARD.decode(payload.trim()).ok()
}

fn decode(bytes: &[u8]) -> Result<(DynamicImage, ImageFormat), StyleError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| StyleError::Decode(e.to_string()))?;
    let format = reader
        .format()
        .ok_or_else(|| StyleError::Decode("unrecognized image format".into()))?;
    let image = reader.decode().map_err(|e| StyleError::Decode(e.to_string()))?;
    Ok((image, format))
}

fn encode(image: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>, StyleError> {
    let mut out = Cursor::new(Vec::new());
    // JPEG has no alpha channel
    let result = match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(image.to_rgb8()).write_to(&mut out, format),
        _ => image.write_to(&mut out, format),
    };
    result.map_err(|e| StyleError::Encode(e.to_string()))?;
    Ok(out.into_inner())
}

/// Formats the prediction API takes as-is
const PASSTHROUGH_FORMATS: [ImageFormat; 3] =
    [ImageFormat::Png, ImageFormat::Jpeg, ImageFormat::WebP];

/// Decode the upload and shrink it into `bound` if it does not fit already.
///
/// An image that already fits, in a format the remote API accepts, keeps its
/// original bytes. Anything else goes out as PNG.
pub fn prepare_input(bytes: &[u8], bound: (u32, u32)) -> Result<PreparedImage, StyleError> {
    let (image, format) = decode(bytes)?;
    let (original_width, original_height) = (image.width(), image.height());
    let (max_w, max_h) = bound;
    let fits = original_width <= max_w && original_height <= max_h;

    if fits && !PASSTHROUGH_FORMATS.contains(&format) {
        info!("Converting {format:?} upload to PNG");
        return Ok(PreparedImage {
            bytes: encode(&image, ImageFormat::Png)?,
            mime: ImageFormat::Png.to_mime_type(),
            original_width,
            original_height,
            resized: false,
        });
    }

    if fits {
        info!("Image size unchanged: {original_width}x{original_height} (already optimal)");
        return Ok(PreparedImage {
            bytes: bytes.to_vec(),
            mime: format.to_mime_type(),
            original_width,
            original_height,
            resized: false,
        });
    }

    let (w, h) = fit_dimensions(original_width, original_height, max_w, max_h);
    let resized = image.resize_exact(w, h, FilterType::Lanczos3);
    info!("Resized image from {original_width}x{original_height} to {w}x{h}");

    Ok(PreparedImage {
        bytes: encode(&resized, ImageFormat::Png)?,
        mime: ImageFormat::Png.to_mime_type(),
        original_width,
        original_height,
        resized: true,
    })
}

/// Re-encode as JPEG at exactly `width`x`height`, ignoring aspect ratio
pub fn resize_to(bytes: &[u8], width: u32, height: u32) -> Result<Vec<u8>, StyleError> {
    let (image, _) = decode(bytes)?;
    let image = if image.width() == width && image.height() == height {
        image
    } else {
        image.resize_exact(width, height, FilterType::Lanczos3)
    };
    encode(&image, ImageFormat::Jpeg)
}

/// Width and height of encoded image bytes
pub fn dimensions(bytes: &[u8]) -> Result<(u32, u32), StyleError> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| StyleError::Decode(e.to_string()))?
        .into_dimensions()
        .map_err(|e| StyleError::Decode(e.to_string()))
}

#[cfg(test)]
pub(crate) fn test_png(width: u32, height: u32) -> Vec<u8> {
    let image = image::RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    encode(&DynamicImage::ImageRgb8(image), ImageFormat::Png).unwrap()
}
