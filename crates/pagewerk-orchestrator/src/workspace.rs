// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Per-run scratch directory for intermediate page images.

use std::path::{Path, PathBuf};

use pagewerk_core::error::{PagewerkError, Result};
use tempfile::TempDir;
use tracing::{debug, warn};

/// A uniquely named directory under the scratch root, removed when the run
/// ends. [`RunWorkspace::cleanup`] removes it and logs failures; if the
/// workspace is dropped instead (for example when a run future is abandoned),
/// removal is still attempted, silently.
#[derive(Debug)]
pub struct RunWorkspace {
    dir: TempDir,
}

impl RunWorkspace {
    pub fn create(scratch_root: &Path) -> Result<Self> {
        std::fs::create_dir_all(scratch_root)?;
        let dir = tempfile::Builder::new()
            .prefix("run-")
            .tempdir_in(scratch_root)
            .map_err(|err| {
                PagewerkError::Io(std::io::Error::new(
                    err.kind(),
                    format!("cannot create workspace in {}: {err}", scratch_root.display()),
                ))
            })?;
        debug!(path = %dir.path().display(), "Run workspace created");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Where the enhanced image of `page` is stored.
    pub fn page_path(&self, page: u32) -> PathBuf {
        self.dir.path().join(format!("page_{page:03}.png"))
    }

    /// Remove the workspace. Never fails; problems are logged.
    pub fn cleanup(self) {
        let path = self.dir.path().to_path_buf();
        match self.dir.close() {
            Ok(()) => debug!(path = %path.display(), "Run workspace removed"),
            Err(err) => warn!(path = %path.display(), error = %err, "Failed to remove run workspace"),
        }
    }
}
