// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF reader: open a source document with `lopdf` and inspect its page tree.

use std::path::Path;

use lopdf::Document;
use pagewerk_core::error::{PagewerkError, Result};
use tracing::{debug, instrument};

/// Read-only view of a source PDF.
pub struct PdfReader {
    document: Document,
}

impl PdfReader {
    /// Open a PDF from the filesystem.
    ///
    /// Anything `lopdf` cannot parse is reported as `SourceUnreadable`.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let document = Document::load(path).map_err(|err| PagewerkError::SourceUnreadable {
            path: path.to_path_buf(),
            detail: err.to_string(),
        })?;

        debug!(pages = document.get_pages().len(), "PDF loaded");

        Ok(Self { document })
    }

    /// Create a reader from raw PDF bytes already in memory.
    #[instrument(skip_all, fields(bytes_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let document = Document::load_mem(data)
            .map_err(|err| PagewerkError::PdfError(format!("failed to load PDF from memory: {err}")))?;

        debug!(pages = document.get_pages().len(), "PDF loaded from bytes");

        Ok(Self { document })
    }

    /// Number of pages in the document.
    pub fn page_count(&self) -> u32 {
        self.document.get_pages().len() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn garbage_file_is_source_unreadable() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"%PDF-1.4\nthis is not really a pdf").expect("write");

        match PdfReader::open(&path) {
            Err(PagewerkError::SourceUnreadable { path: reported, .. }) => {
                assert_eq!(reported, path);
            }
            Err(other) => panic!("expected SourceUnreadable, got {other:?}"),
            Ok(_) => panic!("expected SourceUnreadable, got a reader"),
        }
    }

    #[test]
    fn missing_file_is_source_unreadable() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(matches!(
            PdfReader::open(dir.path().join("absent.pdf")),
            Err(PagewerkError::SourceUnreadable { .. })
        ));
    }
}
