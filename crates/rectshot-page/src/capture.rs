//! Cropping the full-viewport capture down to the selected rectangle.

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{DynamicImage, ImageFormat};
use rectshot_core::CaptureRect;
use thiserror::Error;

const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no screenshot data available")]
    EmptyCapture,

    #[error("not a base64 data URL: {0}")]
    InvalidDataUrl(String),

    #[error("failed to decode screenshot: {0}")]
    Decode(String),

    #[error("failed to encode cropped image: {0}")]
    Encode(String),

    #[error("selection lies outside the {width}x{height} screenshot")]
    OutOfBounds { width: u32, height: u32 },
}

/// A cropped region, ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CroppedCapture {
    pub data_url: String,
    pub width: u32,
    pub height: u32,
}

/// Wrap raw PNG bytes as a data URL.
pub fn png_data_url(png: &[u8]) -> String {
    format!("{PNG_DATA_URL_PREFIX}{}", STANDARD.encode(png))
}

fn decode_data_url(data_url: &str) -> Result<Vec<u8>, CaptureError> {
    let rest = data_url
        .strip_prefix("data:")
        .ok_or_else(|| CaptureError::InvalidDataUrl("missing data: scheme".into()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| CaptureError::InvalidDataUrl("missing payload".into()))?;
    if !header.ends_with(";base64") {
        return Err(CaptureError::InvalidDataUrl(format!(
            "unsupported encoding: {header}"
        )));
    }
    STANDARD
        .decode(payload.trim())
        .map_err(|e| CaptureError::InvalidDataUrl(e.to_string()))
}

/// Crop `rect` (CSS pixels) out of a full-viewport capture.
///
/// The rectangle is scaled by `device_pixel_ratio`, rounded to whole pixels
/// and clamped to the image. The result is always PNG.
pub fn crop_data_url(
    data_url: &str,
    rect: &CaptureRect,
    device_pixel_ratio: f64,
) -> Result<CroppedCapture, CaptureError> {
    if data_url.is_empty() {
        return Err(CaptureError::EmptyCapture);
    }
    let bytes = decode_data_url(data_url)?;
    let image = image::load_from_memory(&bytes).map_err(|e| CaptureError::Decode(e.to_string()))?;
    let (width, height) = (image.width(), image.height());

    let scaled = rect.scaled(device_pixel_ratio);
    let out_of_bounds = CaptureError::OutOfBounds { width, height };
    let coords = [scaled.x, scaled.y, scaled.width, scaled.height];
    if coords.iter().any(|c| !c.is_finite()) {
        return Err(out_of_bounds);
    }

    let left = scaled.x.round().max(0.0);
    let top = scaled.y.round().max(0.0);
    let right = (scaled.x + scaled.width).round().min(f64::from(width));
    let bottom = (scaled.y + scaled.height).round().min(f64::from(height));
    if right <= left || bottom <= top {
        return Err(out_of_bounds);
    }

    // Bounded by the image dimensions above, so the casts cannot truncate.
    let (x, y) = (left as u32, top as u32);
    let (w, h) = ((right - left) as u32, (bottom - top) as u32);
    let cropped = image.crop_imm(x, y, w, h);

    tracing::debug!(x, y, w, h, source_w = width, source_h = height, "cropped capture");
    Ok(CroppedCapture {
        data_url: png_data_url(&encode_png(&cropped)?),
        width: w,
        height: h,
    })
}

fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, CaptureError> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(|e| CaptureError::Encode(e.to_string()))?;
    Ok(buffer.into_inner())
}
