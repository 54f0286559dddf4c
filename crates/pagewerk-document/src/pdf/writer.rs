// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF writer: assemble raster pages into one multi-page document using
// `printpdf` 0.8.
//
// printpdf 0.8 uses a data-oriented API: each page is a `PdfPage` holding a
// `Vec<Op>` operation list, and the whole document is serialised at once via
// `PdfDocument::save()`.

use std::path::Path;

use image::DynamicImage;
use pagewerk_core::error::{PagewerkError, Result};
use printpdf::{
    Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Pt, RawImage, RawImageData,
    RawImageFormat, XObjectTransform,
};
use tracing::{debug, info, instrument, warn};

const MM_PER_INCH: f32 = 25.4;

/// Builds a PDF with one full-bleed image per page.
///
/// Every page is sized to its image at the writer's resolution, so a page
/// rasterized at 300 DPI comes back at its original physical size.
pub struct PdfWriter {
    document: PdfDocument,
    pages: Vec<PdfPage>,
    dpi: f32,
}

impl PdfWriter {
    /// Create an empty document. `dpi` must be positive.
    pub fn new(title: &str, dpi: u32) -> Result<Self> {
        if dpi == 0 {
            return Err(PagewerkError::PdfError(
                "page resolution must be positive".into(),
            ));
        }
        Ok(Self {
            document: PdfDocument::new(title),
            pages: Vec::new(),
            dpi: dpi as f32,
        })
    }

    /// Number of pages added so far.
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Append `image` as the next page.
    #[instrument(skip_all, fields(page = self.pages.len() + 1))]
    pub fn add_page(&mut self, image: &DynamicImage) -> Result<()> {
        let (width, height) = (image.width(), image.height());
        if width == 0 || height == 0 {
            return Err(PagewerkError::PdfError(format!(
                "page {} has an empty image",
                self.pages.len() + 1
            )));
        }

        // printpdf embeds RGB8 reliably for every viewer; grayscale pages are
        // expanded here.
        let raw = RawImage {
            pixels: RawImageData::U8(image.to_rgb8().into_raw()),
            width: width as usize,
            height: height as usize,
            data_format: RawImageFormat::RGB8,
            tag: Vec::new(),
        };
        let xobject_id = self.document.add_image(&raw);

        let page_w = Mm(width as f32 / self.dpi * MM_PER_INCH);
        let page_h = Mm(height as f32 / self.dpi * MM_PER_INCH);

        let ops = vec![Op::UseXobject {
            id: xobject_id,
            transform: XObjectTransform {
                translate_x: Some(Pt(0.0)),
                translate_y: Some(Pt(0.0)),
                scale_x: Some(1.0),
                scale_y: Some(1.0),
                dpi: Some(self.dpi),
                rotate: None,
            },
        }];

        self.pages.push(PdfPage::new(page_w, page_h, ops));
        debug!(width, height, page_w_mm = page_w.0, page_h_mm = page_h.0, "Page placed");
        Ok(())
    }

    /// Serialise the document. At least one page is required.
    #[instrument(skip(self), fields(pages = self.pages.len()))]
    pub fn finish(mut self) -> Result<Vec<u8>> {
        if self.pages.is_empty() {
            return Err(PagewerkError::PdfError("document has no pages".into()));
        }

        let page_count = self.pages.len();
        self.document.with_pages(self.pages);

        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        let output = self.document.save(&PdfSaveOptions::default(), &mut warnings);
        if !warnings.is_empty() {
            warn!(count = warnings.len(), "printpdf reported warnings while saving");
        }

        info!(page_count, bytes = output.len(), "PDF assembled");
        Ok(output)
    }

    /// Serialise the document straight to `path`.
    pub fn write_to_file(self, path: impl AsRef<Path>) -> Result<()> {
        let bytes = self.finish()?;
        std::fs::write(path.as_ref(), &bytes)?;
        info!("Wrote PDF to {}", path.as_ref().display());
        Ok(())
    }
}
