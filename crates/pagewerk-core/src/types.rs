// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Pagewerk scan cleanup engine.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::PagewerkError;

/// The stages of the enhancement pipeline.
///
/// Stages always execute in [`StageName::ORDER`], whichever of them are
/// enabled. Grayscale normalization is unconditional; the rest are optional.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageName {
    Grayscale,
    Denoising,
    Clahe,
    Contrast,
    Sharpening,
    Binarization,
}

impl StageName {
    /// Fixed execution order.
    pub const ORDER: [StageName; 6] = [
        StageName::Grayscale,
        StageName::Denoising,
        StageName::Clahe,
        StageName::Contrast,
        StageName::Sharpening,
        StageName::Binarization,
    ];

    /// Configuration key of the stage (matches the JSON block name).
    pub fn key(&self) -> &'static str {
        match self {
            Self::Grayscale => "grayscale",
            Self::Denoising => "denoising",
            Self::Clahe => "clahe",
            Self::Contrast => "contrast",
            Self::Sharpening => "sharpening",
            Self::Binarization => "binarization",
        }
    }

    /// Parse a configuration key back into a stage.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ORDER
            .into_iter()
            .find(|stage| stage.key().eq_ignore_ascii_case(key))
    }

    /// Whether the stage can be switched off.
    pub fn is_optional(&self) -> bool {
        !matches!(self, Self::Grayscale)
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// What to do with the output when some pages fail.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PagePolicy {
    /// Assemble whatever succeeded; failed pages are left out and reported.
    #[default]
    SkipFailed,
    /// Any failed page fails the whole run.
    RequireAll,
}

/// A recorded failure for one page (1-indexed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageFailure {
    pub page: u32,
    pub cause: String,
}

impl PageFailure {
    pub fn new(page: u32, cause: impl Into<String>) -> Self {
        Self {
            page,
            cause: cause.into(),
        }
    }

    /// The failure as a `PageProcessing` error, the class every skipped page
    /// is recorded under.
    pub fn to_error(&self) -> PagewerkError {
        PagewerkError::PageProcessing {
            page: self.page,
            detail: self.cause.clone(),
        }
    }
}

impl fmt::Display for PageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "page {}: {}", self.page, self.cause)
    }
}

/// Outcome of processing a single page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageResult {
    /// The page was rasterized, enhanced, and written to `artifact`.
    Enhanced { page: u32, artifact: PathBuf },
    /// The page could not be produced.
    Failed(PageFailure),
}

impl PageResult {
    /// 1-indexed page number.
    pub fn page(&self) -> u32 {
        match self {
            Self::Enhanced { page, .. } => *page,
            Self::Failed(failure) => failure.page,
        }
    }

    pub fn is_enhanced(&self) -> bool {
        matches!(self, Self::Enhanced { .. })
    }
}

/// Summary of a completed document run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    /// Assembled output document.
    pub output: PathBuf,
    /// Page count of the source document.
    pub page_count: u32,
    /// Pages present in the output, ascending.
    pub enhanced_pages: Vec<u32>,
    /// Pages left out of the output.
    pub failed_pages: Vec<PageFailure>,
}

impl RunReport {
    /// Whether every source page made it into the output.
    pub fn is_complete(&self) -> bool {
        self.failed_pages.is_empty()
    }
}

/// States of a single document run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Start,
    Rasterizing(u32),
    Enhancing(u32),
    Assembling,
    Done,
    Failed,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => f.write_str("start"),
            Self::Rasterizing(page) => write!(f, "rasterizing page {page}"),
            Self::Enhancing(page) => write!(f, "enhancing page {page}"),
            Self::Assembling => f.write_str("assembling"),
            Self::Done => f.write_str("done"),
            Self::Failed => f.write_str("failed"),
        }
    }
}
