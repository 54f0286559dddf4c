// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Pagewerk.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::{PageFailure, StageName};

/// Top-level error type for all Pagewerk operations.
#[derive(Debug, Error)]
pub enum PagewerkError {
    // -- Configuration --
    #[error("invalid {stage} setting `{field}`: {reason}")]
    ConfigValidation {
        stage: StageName,
        field: &'static str,
        reason: String,
    },

    #[error("invalid pipeline setting `{field}`: {reason}")]
    InvalidSetting { field: &'static str, reason: String },

    // -- Run-level failures --
    #[error("source document {} is unreadable: {detail}", .path.display())]
    SourceUnreadable { path: PathBuf, detail: String },

    #[error("page {page} failed: {detail}")]
    PageProcessing { page: u32, detail: String },

    #[error("assembly failed: {0}")]
    Assembly(String),

    #[error("no page could be processed ({} failed)", .failures.len())]
    NoPagesProduced { failures: Vec<PageFailure> },

    #[error("{} page(s) failed and every page is required: {}", .failures.len(), failed_page_list(.failures))]
    IncompleteDocument { failures: Vec<PageFailure> },

    // -- Collaborator bounds --
    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: String, secs: u64 },

    #[error("operation cancelled")]
    Cancelled,

    #[error("required tool is not available: {0}")]
    ToolUnavailable(String),

    // -- Cache --
    #[error("cache index error: {0}")]
    CacheIo(String),

    // -- Leaf failures --
    #[error("image processing failed: {0}")]
    ImageError(String),

    #[error("PDF operation failed: {0}")]
    PdfError(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PagewerkError {
    /// Shorthand for building a [`PagewerkError::ConfigValidation`].
    pub fn invalid(stage: StageName, field: &'static str, reason: impl Into<String>) -> Self {
        Self::ConfigValidation {
            stage,
            field,
            reason: reason.into(),
        }
    }

    /// Shorthand for building a [`PagewerkError::InvalidSetting`].
    pub fn invalid_setting(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidSetting {
            field,
            reason: reason.into(),
        }
    }

    /// Page index this error is attached to, when it has one.
    pub fn page(&self) -> Option<u32> {
        match self {
            Self::PageProcessing { page, .. } => Some(*page),
            _ => None,
        }
    }
}

fn failed_page_list(failures: &[PageFailure]) -> String {
    failures
        .iter()
        .map(|f| f.page.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, PagewerkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_error_names_stage_and_field() {
        let err = PagewerkError::invalid(StageName::Binarization, "block_size", "must be odd, got 10");
        assert_eq!(
            err.to_string(),
            "invalid binarization setting `block_size`: must be odd, got 10"
        );
    }

    #[test]
    fn incomplete_document_lists_pages() {
        let err = PagewerkError::IncompleteDocument {
            failures: vec![
                PageFailure::new(2, "render failed"),
                PageFailure::new(5, "render failed"),
            ],
        };
        assert!(err.to_string().ends_with("2, 5"));
    }
}
