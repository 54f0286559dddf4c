// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// pagewerk-bridge: the collaborator interfaces a document run depends on,
// and their production implementations (poppler's `pdftoppm` for rendering,
// printpdf for assembly).

pub mod assembler;
pub mod poppler;
pub mod traits;

pub use assembler::PdfAssembler;
pub use poppler::PdftoppmRasterizer;
pub use traits::{Assembler, Rasterizer};
