// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Narrow interfaces to the external collaborators of a document run.
//
// The orchestrator owns timeouts and cancellation; implementations only do
// the work and report failures in their own error category.

use std::future::Future;
use std::path::{Path, PathBuf};

use image::DynamicImage;
use pagewerk_core::error::Result;

/// Turns pages of a source document into pixel buffers.
///
/// Failures of either method are reported as `SourceUnreadable` (or
/// `ToolUnavailable` when the backing renderer is missing).
pub trait Rasterizer: Send + Sync {
    /// Number of pages in `source`.
    fn page_count(&self, source: &Path) -> impl Future<Output = Result<u32>> + Send;

    /// Render one page (1-based) at `dpi`.
    fn rasterize(
        &self,
        source: &Path,
        page: u32,
        dpi: u32,
    ) -> impl Future<Output = Result<DynamicImage>> + Send;
}

/// Combines enhanced page images into the output document.
pub trait Assembler: Send + Sync {
    /// Write `pages` (already in page order) to `output` and return its path.
    /// Failures are reported as `Assembly`.
    fn assemble(
        &self,
        pages: &[PathBuf],
        output: &Path,
    ) -> impl Future<Output = Result<PathBuf>> + Send;
}
