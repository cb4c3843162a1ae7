//! Image file validation performed before any upload or processing.

use image::ImageFormat;

use crate::error::CoreError;

/// Largest accepted upload (20 MiB).
pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Formats the inference backend accepts.
pub const ACCEPTED_FORMATS: &[ImageFormat] = &[
    ImageFormat::Png,
    ImageFormat::Jpeg,
    ImageFormat::WebP,
    ImageFormat::Bmp,
    ImageFormat::Tiff,
    ImageFormat::Gif,
];

/// Check that `bytes` is a non-empty, reasonably sized image in an
/// accepted format. Returns the sniffed format.
pub fn validate_image_file(name: &str, bytes: &[u8]) -> Result<ImageFormat, CoreError> {
    if bytes.is_empty() {
        return Err(CoreError::Validation(format!("'{name}' is empty")));
    }
    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(CoreError::Validation(format!(
            "'{name}' is {} bytes; the limit is {MAX_UPLOAD_BYTES} bytes",
            bytes.len()
        )));
    }

    let format = image::guess_format(bytes)
        .map_err(|_| CoreError::Validation(format!("'{name}' is not a recognized image")))?;

    if !ACCEPTED_FORMATS.contains(&format) {
        return Err(CoreError::Validation(format!(
            "'{name}' is a {format:?} image, which is not supported"
        )));
    }
    Ok(format)
}

/// Preferred file extension for image bytes, falling back to `png`.
pub fn extension_for(bytes: &[u8]) -> &'static str {
    image::guess_format(bytes)
        .ok()
        .and_then(|f| f.extensions_str().first().copied())
        .unwrap_or("png")
}
