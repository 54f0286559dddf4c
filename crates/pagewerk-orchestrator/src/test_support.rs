// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory collaborators for orchestrator and service tests.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use image::{DynamicImage, GrayImage, Rgb, RgbImage};
use pagewerk_bridge::{Assembler, Rasterizer};
use pagewerk_core::error::{PagewerkError, Result};
use pagewerk_document::image::load_page;

/// Produces synthetic pages and counts how often it is asked to.
pub struct FakeRasterizer {
    pages: u32,
    failing: HashSet<u32>,
    hanging: HashSet<u32>,
    unreadable: bool,
    size: (u32, u32),
    pub count_calls: AtomicUsize,
    pub rasterize_calls: AtomicUsize,
}

impl FakeRasterizer {
    pub fn new(pages: u32) -> Self {
        Self {
            pages,
            failing: HashSet::new(),
            hanging: HashSet::new(),
            unreadable: false,
            size: (64, 48),
            count_calls: AtomicUsize::new(0),
            rasterize_calls: AtomicUsize::new(0),
        }
    }

    /// `page` fails to render.
    pub fn failing_on(mut self, page: u32) -> Self {
        self.failing.insert(page);
        self
    }

    /// Rendering `page` never finishes.
    pub fn hanging_on(mut self, page: u32) -> Self {
        self.hanging.insert(page);
        self
    }

    /// Render every page at `width` x `height` pixels.
    pub fn with_page_size(mut self, width: u32, height: u32) -> Self {
        self.size = (width, height);
        self
    }

    /// The page count cannot be read.
    pub fn unreadable(mut self) -> Self {
        self.unreadable = true;
        self
    }
}

impl Rasterizer for FakeRasterizer {
    async fn page_count(&self, source: &Path) -> Result<u32> {
        self.count_calls.fetch_add(1, Ordering::SeqCst);
        if self.unreadable {
            return Err(PagewerkError::SourceUnreadable {
                path: source.to_path_buf(),
                detail: "simulated damaged xref table".into(),
            });
        }
        Ok(self.pages)
    }

    async fn rasterize(&self, source: &Path, page: u32, _dpi: u32) -> Result<DynamicImage> {
        self.rasterize_calls.fetch_add(1, Ordering::SeqCst);
        if self.hanging.contains(&page) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        if self.failing.contains(&page) {
            return Err(PagewerkError::SourceUnreadable {
                path: source.to_path_buf(),
                detail: format!("simulated render failure on page {page}"),
            });
        }
        Ok(sample_page(page, self.size.0, self.size.1))
    }
}

/// Colour page with dark "text" bars on a light, slightly uneven background.
pub fn sample_page(page: u32, width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        let ink = (y / 4) % 3 == 1 && (x + page * 3) % 11 < 8;
        let shade = if ink { 40 } else { 200 + ((x + y) % 30) as u8 };
        Rgb([shade, shade, shade.saturating_sub(10)])
    }))
}

/// Records what it was asked to assemble and writes a stand-in document.
pub struct RecordingAssembler {
    fail: bool,
    calls: Mutex<Vec<Vec<PathBuf>>>,
    images: Mutex<Vec<GrayImage>>,
}

impl RecordingAssembler {
    pub fn new() -> Self {
        Self {
            fail: false,
            calls: Mutex::new(Vec::new()),
            images: Mutex::new(Vec::new()),
        }
    }

    /// Writes a partial output, then reports failure.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn calls(&self) -> Vec<Vec<PathBuf>> {
        self.calls.lock().expect("calls lock").clone()
    }

    /// Decoded pages of every call, in the order received.
    pub fn images(&self) -> Vec<GrayImage> {
        self.images.lock().expect("images lock").clone()
    }
}

impl Assembler for RecordingAssembler {
    async fn assemble(&self, pages: &[PathBuf], output: &Path) -> Result<PathBuf> {
        let mut decoded = Vec::with_capacity(pages.len());
        for page in pages {
            decoded.push(load_page(page)?.to_luma8());
        }
        self.calls.lock().expect("calls lock").push(pages.to_vec());
        self.images.lock().expect("images lock").extend(decoded);

        if self.fail {
            std::fs::write(output, b"%PDF-1.7 truncated")?;
            return Err(PagewerkError::Assembly("simulated writer failure".into()));
        }
        std::fs::write(output, format!("%PDF-1.7 stand-in, {} pages", pages.len()))?;
        Ok(output.to_path_buf())
    }
}
