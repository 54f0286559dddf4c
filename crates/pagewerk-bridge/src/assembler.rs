// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-process assembler: enhanced PNG pages → one multi-page PDF.

use std::path::{Path, PathBuf};

use pagewerk_core::error::{PagewerkError, Result};
use pagewerk_document::PdfWriter;
use pagewerk_document::image::load_page;
use tracing::{info, instrument};

use crate::traits::Assembler;

/// Assembles pages with `printpdf`, sizing each page to its image at `dpi`.
#[derive(Debug, Clone)]
pub struct PdfAssembler {
    dpi: u32,
    title: String,
}

impl PdfAssembler {
    pub fn new(dpi: u32) -> Self {
        Self {
            dpi,
            title: "Pagewerk enhanced document".to_owned(),
        }
    }

    /// Title written to the PDF metadata.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn dpi(&self) -> u32 {
        self.dpi
    }
}

impl Assembler for PdfAssembler {
    #[instrument(skip_all, fields(pages = pages.len(), output = %output.display()))]
    async fn assemble(&self, pages: &[PathBuf], output: &Path) -> Result<PathBuf> {
        let pages = pages.to_vec();
        let target = output.to_path_buf();
        let dpi = self.dpi;
        let title = self.title.clone();

        let written = tokio::task::spawn_blocking(move || write_document(&title, dpi, &pages, &target))
            .await
            .map_err(|err| PagewerkError::Assembly(format!("assembly task failed: {err}")))?
            .map_err(|err| match err {
                PagewerkError::Assembly(_) => err,
                other => PagewerkError::Assembly(other.to_string()),
            })?;

        info!(output = %written.display(), "Document assembled");
        Ok(written)
    }
}

/// Pages are decoded one at a time; only the encoded document is held in
/// memory as a whole.
fn write_document(title: &str, dpi: u32, pages: &[PathBuf], output: &Path) -> Result<PathBuf> {
    if pages.is_empty() {
        return Err(PagewerkError::Assembly("no pages to assemble".into()));
    }
    let mut writer = PdfWriter::new(title, dpi)?;
    for page in pages {
        let image = load_page(page)?;
        writer.add_page(&image)?;
    }
    writer.write_to_file(output)?;
    Ok(output.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};
    use pagewerk_document::PdfReader;
    use pagewerk_document::image::save_png;

    #[tokio::test]
    async fn assembles_png_pages_into_pdf() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut pages = Vec::new();
        for i in 1..=3u32 {
            let path = dir.path().join(format!("page_{i:03}.png"));
            save_png(&GrayImage::from_pixel(40, 50, Luma([(i * 50) as u8])), &path).expect("save");
            pages.push(path);
        }

        let output = dir.path().join("out.pdf");
        let written = PdfAssembler::new(300)
            .assemble(&pages, &output)
            .await
            .expect("assemble");
        assert_eq!(written, output);
        assert_eq!(PdfReader::open(&output).expect("open").page_count(), 3);
    }

    #[tokio::test]
    async fn missing_page_is_assembly_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let pages = vec![dir.path().join("page_001.png")];
        let result = PdfAssembler::new(300)
            .assemble(&pages, &dir.path().join("out.pdf"))
            .await;
        assert!(matches!(result, Err(PagewerkError::Assembly(_))));
    }

    #[tokio::test]
    async fn empty_page_list_is_assembly_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = PdfAssembler::new(300)
            .assemble(&[], &dir.path().join("out.pdf"))
            .await;
        assert!(matches!(result, Err(PagewerkError::Assembly(_))));
    }
}
