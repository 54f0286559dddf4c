// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Rasterizer backed by poppler: page counts come from `lopdf`, page images
// from the `pdftoppm` binary.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use image::DynamicImage;
use pagewerk_core::error::{PagewerkError, Result};
use pagewerk_document::PdfReader;
use pagewerk_document::image::decode_page;
use tokio::process::Command;
use tracing::{debug, info, instrument};

use crate::traits::Rasterizer;

/// Name of the poppler renderer on `PATH`.
pub const PDFTOPPM: &str = "pdftoppm";

/// Renders single pages with `pdftoppm`, one child process per page.
///
/// The page is written as PPM to the child's stdout, so no intermediate
/// files are created. Children are spawned with `kill_on_drop`, so a call
/// abandoned by a timeout or cancellation also terminates the process.
#[derive(Debug, Clone)]
pub struct PdftoppmRasterizer {
    binary: PathBuf,
}

impl PdftoppmRasterizer {
    /// Find `pdftoppm` on `PATH`.
    pub fn locate() -> Result<Self> {
        let binary = which::which(PDFTOPPM)
            .map_err(|err| PagewerkError::ToolUnavailable(format!("{PDFTOPPM}: {err}")))?;
        info!(binary = %binary.display(), "Using pdftoppm");
        Ok(Self { binary })
    }

    /// Use an explicit renderer binary.
    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn binary(&self) -> &Path {
        &self.binary
    }
}

impl Rasterizer for PdftoppmRasterizer {
    #[instrument(skip_all, fields(source = %source.display()))]
    async fn page_count(&self, source: &Path) -> Result<u32> {
        let path = source.to_path_buf();
        let count = tokio::task::spawn_blocking(move || PdfReader::open(&path).map(|r| r.page_count()))
            .await
            .map_err(|err| unreadable(source, format!("page count task failed: {err}")))??;
        debug!(count, "Page count read");
        Ok(count)
    }

    #[instrument(skip_all, fields(source = %source.display(), page = page, dpi = dpi))]
    async fn rasterize(&self, source: &Path, page: u32, dpi: u32) -> Result<DynamicImage> {
        let page_arg = page.to_string();
        let output = Command::new(&self.binary)
            .arg("-r")
            .arg(dpi.to_string())
            .arg("-f")
            .arg(&page_arg)
            .arg("-l")
            .arg(&page_arg)
            .arg("-singlefile")
            .arg(source)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|err| {
                PagewerkError::ToolUnavailable(format!("{}: {err}", self.binary.display()))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(unreadable(
                source,
                format!("{PDFTOPPM} exited with {} on page {page}: {}", output.status, stderr.trim()),
            ));
        }
        if output.stdout.is_empty() {
            return Err(unreadable(source, format!("{PDFTOPPM} produced no image for page {page}")));
        }

        let bytes = output.stdout;
        let image = tokio::task::spawn_blocking(move || decode_page(&bytes))
            .await
            .map_err(|err| unreadable(source, format!("decode task failed: {err}")))?
            .map_err(|err| unreadable(source, format!("page {page}: {err}")))?;

        debug!(width = image.width(), height = image.height(), "Page rasterized");
        Ok(image)
    }
}

fn unreadable(source: &Path, detail: String) -> PagewerkError {
    PagewerkError::SourceUnreadable {
        path: source.to_path_buf(),
        detail,
    }
}
