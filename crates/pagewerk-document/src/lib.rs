// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// pagewerk-document: page-level image and PDF operations.
//
// Provides the enhancement pipeline that prepares scanned pages for text
// recognition (grayscale, denoising, CLAHE, contrast, sharpening, adaptive
// binarization), PNG page persistence, source page counting, and assembly of
// enhanced pages into a single PDF.

pub mod image;
pub mod pdf;
pub mod scan;

// Re-export the primary structs so callers can use `pagewerk_document::PdfWriter` etc.
pub use pdf::reader::PdfReader;
pub use pdf::writer::PdfWriter;
pub use scan::enhance::EnhancementPipeline;
