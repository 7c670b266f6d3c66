//! Page image → base64 PNG `ImageData` for the vision model.
//!
//! PNG is lossless, which keeps small heading text legible; `detail: "high"`
//! stops GPT-4-class models from downsampling the page to a single tile.

use crate::error::ResolveError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode one rasterised page. `page` is 0-indexed and only used for errors.
pub fn encode_page(page: usize, img: &DynamicImage) -> Result<ImageData, ResolveError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| ResolveError::analysis_on_page(page, format!("PNG encoding failed: {}", e)))?;

    let b64 = STANDARD.encode(&buf);
    debug!("Encoded page {} → {} bytes base64", page + 1, b64.len());

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}
