// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Scan enhancement: the stage library and the pipeline that runs it.

pub mod enhance;
pub mod stages;

pub use enhance::EnhancementPipeline;
