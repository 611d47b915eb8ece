//! # Image Loading
//!
//! Loads images from file paths, data URIs, or raw base64 strings and reads
//! their pixel dimensions. Layout only needs the size; pixels stay with the
//! renderer.
//!
//! Failures are reported as [`FolioError::Image`] and contained at the node:
//! the image presentation draws a placeholder box instead.

use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Cursor;

use crate::error::FolioError;

/// Pixel dimensions of a loaded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    pub width_px: u32,
    pub height_px: u32,
}

/// Load an image from a source string and read its dimensions.
///
/// Supported `src` formats:
/// - `data:image/...;base64,...` data URI
/// - File path (absolute or `./`/`../` relative), read from disk
/// - Raw base64-encoded image data
pub fn load_image(src: &str) -> Result<ImageInfo, FolioError> {
    let raw_bytes = read_source_bytes(src)?;
    decode_dimensions(&raw_bytes)
}

/// Resolve the source string to raw image bytes.
fn read_source_bytes(src: &str) -> Result<Vec<u8>, FolioError> {
    if src.is_empty() {
        return Err(FolioError::Image("empty image source".to_string()));
    }

    if src.starts_with("data:image/") {
        let comma_pos = src
            .find(',')
            .ok_or_else(|| FolioError::Image("invalid data URI: missing comma".to_string()))?;
        return base64_decode(&src[comma_pos + 1..]);
    }

    // Only explicit path prefixes count as files; base64 may contain '/'.
    if src.starts_with('/') || src.starts_with("./") || src.starts_with("../") {
        return std::fs::read(src)
            .map_err(|e| FolioError::Image(format!("failed to read image file '{src}': {e}")));
    }

    base64_decode(src)
}

fn base64_decode(input: &str) -> Result<Vec<u8>, FolioError> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD
        .decode(input.trim())
        .map_err(|e| FolioError::Image(format!("base64 decode error: {e}")))
}

/// Detect the format from magic bytes and read the header dimensions.
fn decode_dimensions(data: &[u8]) -> Result<ImageInfo, FolioError> {
    if data.len() < 4 {
        return Err(FolioError::Image("image data too short".to_string()));
    }
    let reader = image::io::Reader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| FolioError::Image(format!("format detection error: {e}")))?;
    if reader.format().is_none() {
        return Err(FolioError::Image(
            "unsupported image format (expected JPEG, PNG or WebP)".to_string(),
        ));
    }
    let (width_px, height_px) = reader
        .into_dimensions()
        .map_err(|e| FolioError::Image(format!("failed to read image dimensions: {e}")))?;
    Ok(ImageInfo {
        width_px,
        height_px,
    })
}

/// Per-engine memo of image loads, keyed by source string. A document that
/// shows the same picture many times reads it once; failures are cached too.
#[derive(Debug, Default)]
pub struct ImageCache {
    entries: RefCell<HashMap<String, Result<ImageInfo, String>>>,
}

impl ImageCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&self, src: &str) -> Result<ImageInfo, FolioError> {
        if let Some(hit) = self.entries.borrow().get(src) {
            return hit.clone().map_err(FolioError::Image);
        }
        let result = load_image(src).map_err(|e| match e {
            FolioError::Image(msg) => msg,
            other => other.to_string(),
        });
        self.entries
            .borrow_mut()
            .insert(src.to_string(), result.clone());
        result.map_err(FolioError::Image)
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

#[cfg(test)]
pub(crate) fn png_data_uri(width: u32, height: u32) -> String {
    use base64::Engine;
    let img = image::RgbaImage::from_fn(width, height, |_, _| image::Rgba([255, 0, 0, 255]));
    let mut buf = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut buf);
    image::ImageEncoder::write_image(
        encoder,
        img.as_raw(),
        width,
        height,
        image::ColorType::Rgba8,
    )
    .unwrap();
    format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(&buf)
    )
}
