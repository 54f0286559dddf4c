// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Default storage root resolution.

use std::path::PathBuf;

use pagewerk_core::error::{PagewerkError, Result};

/// Return the default storage root, creating it if needed.
///
/// `$XDG_DATA_HOME/pagewerk`, falling back to `~/.local/share/pagewerk`.
pub fn data_dir() -> Result<PathBuf> {
    let dir = resolve(
        std::env::var_os("XDG_DATA_HOME").map(PathBuf::from),
        std::env::var_os("HOME").map(PathBuf::from),
    )?;
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

fn resolve(xdg_data_home: Option<PathBuf>, home: Option<PathBuf>) -> Result<PathBuf> {
    // An empty or relative XDG_DATA_HOME is invalid and must be ignored.
    if let Some(xdg) = xdg_data_home.filter(|p| p.is_absolute()) {
        return Ok(xdg.join("pagewerk"));
    }
    if let Some(home) = home.filter(|p| !p.as_os_str().is_empty()) {
        return Ok(home.join(".local").join("share").join("pagewerk"));
    }
    Err(PagewerkError::invalid_setting(
        "storage_root",
        "could not be derived from XDG_DATA_HOME or HOME; pass --storage-root",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_xdg_data_home() {
        let dir = resolve(Some("/data".into()), Some("/home/ada".into())).expect("resolve");
        assert_eq!(dir, PathBuf::from("/data/pagewerk"));
    }

    #[test]
    fn relative_xdg_falls_back_to_home() {
        let dir = resolve(Some("data".into()), Some("/home/ada".into())).expect("resolve");
        assert_eq!(dir, PathBuf::from("/home/ada/.local/share/pagewerk"));
    }

    #[test]
    fn no_base_directory_is_an_error() {
        assert!(matches!(
            resolve(None, None),
            Err(PagewerkError::InvalidSetting { field: "storage_root", .. })
        ));
    }
}
