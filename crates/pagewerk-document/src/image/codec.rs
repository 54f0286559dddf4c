// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page image codec: decoding rasterizer output and persisting enhanced pages
// as lossless PNG. Intermediate pages are never stored lossy.

use std::path::Path;

use image::{DynamicImage, GrayImage, ImageFormat};
use pagewerk_core::error::{PagewerkError, Result};
use tracing::{debug, instrument};

/// Load a page image from disk, format inferred from its contents.
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn load_page(path: impl AsRef<Path>) -> Result<DynamicImage> {
    let path = path.as_ref();
    let reader = image::ImageReader::open(path)?
        .with_guessed_format()?;
    let page = reader.decode().map_err(|err| {
        PagewerkError::ImageError(format!("failed to decode {}: {err}", path.display()))
    })?;
    debug!(width = page.width(), height = page.height(), "Page image loaded");
    Ok(page)
}

/// Decode an in-memory page image (PNG, PPM, JPEG, ...).
#[instrument(skip(data), fields(data_len = data.len()))]
pub fn decode_page(data: &[u8]) -> Result<DynamicImage> {
    image::load_from_memory(data)
        .map_err(|err| PagewerkError::ImageError(format!("failed to decode page image: {err}")))
}

/// Write an enhanced page as PNG.
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn save_png(page: &GrayImage, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    page.save_with_format(path, ImageFormat::Png).map_err(|err| {
        PagewerkError::ImageError(format!("failed to save page to {}: {err}", path.display()))
    })
}

/// Encode an image as PNG bytes.
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    image
        .write_to(&mut std::io::Cursor::new(&mut buffer), ImageFormat::Png)
        .map_err(|err| PagewerkError::ImageError(format!("PNG encoding failed: {err}")))?;
    Ok(buffer)
}
