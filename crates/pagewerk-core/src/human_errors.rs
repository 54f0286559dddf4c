// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Human-readable error messages for whoever submitted the document.
//
// Every technical error is mapped to plain English with a clear suggestion.
// The severity drives how callers present (and whether they retry) a failure.

use crate::error::PagewerkError;

/// Severity of an error from the submitter's perspective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Timeout or I/O blip; resubmitting the same document may work.
    Transient,
    /// The submitter must change something (settings, input file).
    ActionRequired,
    /// Cannot be fixed by retrying; the document itself is the problem.
    Permanent,
}

/// A human-readable error with plain English message and actionable suggestion.
#[derive(Debug, Clone)]
pub struct HumanError {
    /// Plain English summary.
    pub message: String,
    /// What the submitter should try.
    pub suggestion: String,
    /// Whether resubmitting the request unchanged is worthwhile.
    pub retriable: bool,
    pub severity: Severity,
}

/// Convert a `PagewerkError` into a `HumanError`.
pub fn humanize_error(err: &PagewerkError) -> HumanError {
    match err {
        PagewerkError::ConfigValidation {
            stage,
            field,
            reason,
        } => HumanError {
            message: format!("The {stage} settings are not valid."),
            suggestion: format!("Change `{field}`: it {reason}."),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        PagewerkError::InvalidSetting { field, reason } => HumanError {
            message: "The processing settings are not valid.".into(),
            suggestion: format!("Change `{field}`: it {reason}."),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        PagewerkError::SourceUnreadable { .. } => HumanError {
            message: "We couldn't read this document.".into(),
            suggestion: "The file may be damaged or not a PDF. Open it on a computer to check it works, or try a different file.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        PagewerkError::PageProcessing { page, .. } => HumanError {
            message: format!("Page {page} couldn't be cleaned up."),
            suggestion: "The other pages were processed. Try a lower resolution if this keeps happening.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        PagewerkError::NoPagesProduced { .. } => HumanError {
            message: "None of the pages could be processed.".into(),
            suggestion: "The document may be damaged. Try re-scanning it or exporting it to PDF again.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        PagewerkError::IncompleteDocument { failures } => HumanError {
            message: format!("{} page(s) couldn't be processed.", failures.len()),
            suggestion: "Allow incomplete output, or try again with a lower resolution.".into(),
            retriable: true,
            severity: Severity::ActionRequired,
        },

        PagewerkError::Assembly(_) => HumanError {
            message: "The cleaned pages couldn't be put back together.".into(),
            suggestion: "Try again. If this keeps happening, your storage may be full.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        PagewerkError::Timeout { operation, .. } => HumanError {
            message: "Processing took too long.".into(),
            suggestion: format!("Try again with a lower resolution. ({operation})"),
            retriable: true,
            severity: Severity::Transient,
        },

        PagewerkError::Cancelled => HumanError {
            message: "Processing was cancelled.".into(),
            suggestion: "Submit the document again when you're ready.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        PagewerkError::ToolUnavailable(tool) => HumanError {
            message: "A program needed to read PDF pages is missing.".into(),
            suggestion: format!("Install it and try again ({tool}; usually in the poppler-utils package)."),
            retriable: false,
            severity: Severity::ActionRequired,
        },

        PagewerkError::CacheIo(_) => HumanError {
            message: "Previous results couldn't be reused.".into(),
            suggestion: "Nothing to do. The document will be processed from scratch.".into(),
            retriable: true,
            severity: Severity::Transient,
        },

        PagewerkError::ImageError(_) => HumanError {
            message: "There's a problem with a page image.".into(),
            suggestion: "The page may be in an unusual format. Try exporting the document to PDF again.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        PagewerkError::PdfError(_) => HumanError {
            message: "There's a problem with this PDF file.".into(),
            suggestion: "The file may be damaged. Try opening it on a computer first to check it works, or try a different file.".into(),
            retriable: false,
            severity: Severity::Permanent,
        },

        PagewerkError::Io(io_err) => {
            if io_err.kind() == std::io::ErrorKind::NotFound {
                HumanError {
                    message: "The file couldn't be found.".into(),
                    suggestion: "Check the file path and try again.".into(),
                    retriable: false,
                    severity: Severity::ActionRequired,
                }
            } else if io_err.kind() == std::io::ErrorKind::PermissionDenied {
                HumanError {
                    message: "We don't have permission to access this file.".into(),
                    suggestion: "Check the permissions of the file and the storage directory.".into(),
                    retriable: false,
                    severity: Severity::ActionRequired,
                }
            } else {
                HumanError {
                    message: "There was a problem reading or writing a file.".into(),
                    suggestion: "Try again. If this keeps happening, your storage may be full.".into(),
                    retriable: true,
                    severity: Severity::Transient,
                }
            }
        }

        PagewerkError::Serialization(_) => HumanError {
            message: "The settings file couldn't be read.".into(),
            suggestion: "Check that it is valid JSON. `pagewerk config` prints a working example.".into(),
            retriable: false,
            severity: Severity::ActionRequired,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PageFailure, StageName};

    #[test]
    fn bad_setting_is_action_required() {
        let err = PagewerkError::invalid(StageName::Binarization, "block_size", "must be odd");
        let human = humanize_error(&err);
        assert_eq!(human.severity, Severity::ActionRequired);
        assert!(!human.retriable);
        assert!(human.suggestion.contains("block_size"));
    }

    #[test]
    fn unreadable_source_is_permanent() {
        let err = PagewerkError::SourceUnreadable {
            path: "scan.pdf".into(),
            detail: "not a PDF".into(),
        };
        assert_eq!(humanize_error(&err).severity, Severity::Permanent);
    }

    #[test]
    fn timeout_is_transient() {
        let err = PagewerkError::Timeout {
            operation: "rasterize page 3".into(),
            secs: 120,
        };
        let human = humanize_error(&err);
        assert_eq!(human.severity, Severity::Transient);
        assert!(human.retriable);
    }

    #[test]
    fn incomplete_document_counts_pages() {
        let err = PagewerkError::IncompleteDocument {
            failures: vec![PageFailure::new(1, "x"), PageFailure::new(2, "y")],
        };
        assert!(humanize_error(&err).message.starts_with("2 page(s)"));
    }
}
