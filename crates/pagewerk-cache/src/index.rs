// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Content-addressed result cache.
//
// The index maps a digest to the file name of a previously produced artifact
// inside the cache root. It is read fully at open and rewritten fully on every
// change: serialised to a temp file in the same directory, synced, then
// renamed over the old index, so readers only ever see a complete index.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use chrono::{DateTime, Utc};
use pagewerk_core::error::{PagewerkError, Result};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info, instrument, warn};

use crate::integrity::Digest;

/// File name of the persisted index inside the cache root.
pub const INDEX_FILE_NAME: &str = "cache_index.json";

/// One cached result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Artifact file name, relative to the cache root.
    pub artifact: String,
    pub stored_at: DateTime<Utc>,
}

type IndexMap = BTreeMap<Digest, CacheEntry>;

/// Digest → artifact index persisted as JSON in the cache root.
///
/// Safe to share between concurrent requests: lookups take a read lock on
/// the in-memory map, and every mutation holds the writer lock while it
/// builds the next map, persists it, and swaps it in. The in-memory map only
/// changes once the rewrite has succeeded, so memory never holds an entry
/// the index on disk lacks.
pub struct ContentCache {
    root: PathBuf,
    index_path: PathBuf,
    entries: RwLock<IndexMap>,
    writer: Mutex<()>,
}

impl ContentCache {
    /// Open the cache rooted at `root`, creating the directory if needed.
    ///
    /// A missing index is a cold start. An unreadable or corrupt index is
    /// logged and also treated as empty; it is replaced on the next store.
    #[instrument(skip_all, fields(root = %root.as_ref().display()))]
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)
            .map_err(|err| PagewerkError::CacheIo(format!("cannot create {}: {err}", root.display())))?;
        let index_path = root.join(INDEX_FILE_NAME);

        let entries = match load_index(&index_path) {
            Ok(entries) => {
                info!(entries = entries.len(), "cache index loaded");
                entries
            }
            Err(err) => {
                warn!(error = %err, path = %index_path.display(), "cache index unusable, starting cold");
                IndexMap::new()
            }
        };

        Ok(Self {
            root,
            index_path,
            entries: RwLock::new(entries),
            writer: Mutex::new(()),
        })
    }

    /// Directory holding the index and the artifacts.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute path of an artifact name inside the cache root.
    pub fn artifact_path(&self, artifact: &str) -> PathBuf {
        self.root.join(artifact)
    }

    /// Path of the cached artifact for `digest`, if the entry exists and the
    /// artifact is still on disk. Stale entries are evicted silently.
    #[instrument(skip_all, fields(digest = %digest))]
    pub fn lookup(&self, digest: &Digest) -> Option<PathBuf> {
        let entry = self.read_entries().get(digest).cloned()?;
        let path = self.artifact_path(&entry.artifact);
        if path.is_file() {
            debug!(artifact = %entry.artifact, "cache hit");
            return Some(path);
        }

        info!(artifact = %entry.artifact, "cached artifact missing, evicting entry");
        if let Err(err) = self.evict_if(digest, |current| current == &entry) {
            warn!(error = %err, "failed to persist eviction of stale entry");
        }
        None
    }

    /// Record `artifact` as the result for `digest` and persist the index
    /// before returning.
    #[instrument(skip_all, fields(digest = %digest))]
    pub fn store(&self, digest: &Digest, artifact: &str) -> Result<()> {
        validate_artifact_name(artifact)?;
        let entry = CacheEntry {
            artifact: artifact.to_owned(),
            stored_at: Utc::now(),
        };

        let _writer = self.lock_writer()?;
        let mut next = self.read_entries().clone();
        next.insert(digest.clone(), entry);
        self.persist(&next)?;
        *self.write_entries() = next;
        info!(artifact, "cache entry stored");
        Ok(())
    }

    /// Remove the entry for `digest`. Returns whether one existed.
    #[instrument(skip_all, fields(digest = %digest))]
    pub fn evict(&self, digest: &Digest) -> Result<bool> {
        self.evict_if(digest, |_| true)
    }

    /// Snapshot of all entries, ordered by digest.
    pub fn entries(&self) -> Vec<(Digest, CacheEntry)> {
        self.read_entries()
            .iter()
            .map(|(digest, entry)| (digest.clone(), entry.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // -- Helpers --------------------------------------------------------------

    fn evict_if(&self, digest: &Digest, matches: impl Fn(&CacheEntry) -> bool) -> Result<bool> {
        let _writer = self.lock_writer()?;
        let mut next = self.read_entries().clone();
        match next.get(digest) {
            Some(current) if matches(current) => {
                next.remove(digest);
            }
            _ => return Ok(false),
        }
        self.persist(&next)?;
        *self.write_entries() = next;
        Ok(true)
    }

    /// Rewrite the whole index atomically. Callers hold the writer lock.
    fn persist(&self, entries: &IndexMap) -> Result<()> {
        let json = serde_json::to_vec_pretty(entries)
            .map_err(|err| PagewerkError::CacheIo(format!("serialise index: {err}")))?;

        let mut temp = NamedTempFile::new_in(&self.root)
            .map_err(|err| PagewerkError::CacheIo(format!("create temp index: {err}")))?;
        temp.write_all(&json)
            .map_err(|err| PagewerkError::CacheIo(format!("write temp index: {err}")))?;
        temp.as_file()
            .sync_all()
            .map_err(|err| PagewerkError::CacheIo(format!("sync temp index: {err}")))?;
        temp.persist(&self.index_path)
            .map_err(|err| PagewerkError::CacheIo(format!("replace index: {}", err.error)))?;

        debug!(entries = entries.len(), "cache index persisted");
        Ok(())
    }

    fn lock_writer(&self) -> Result<std::sync::MutexGuard<'_, ()>> {
        self.writer
            .lock()
            .map_err(|_| PagewerkError::CacheIo("cache writer lock poisoned".into()))
    }

    fn read_entries(&self) -> std::sync::RwLockReadGuard<'_, IndexMap> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_entries(&self) -> std::sync::RwLockWriteGuard<'_, IndexMap> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn load_index(path: &Path) -> Result<IndexMap> {
    if !path.exists() {
        return Ok(IndexMap::new());
    }
    let bytes = std::fs::read(path)?;
    let entries: IndexMap = serde_json::from_slice(&bytes)?;
    Ok(entries)
}

/// Artifacts live directly in the cache root; anything that could escape it
/// is rejected.
fn validate_artifact_name(artifact: &str) -> Result<()> {
    let plain = Path::new(artifact)
        .file_name()
        .is_some_and(|name| name == artifact);
    if artifact.is_empty() || !plain || artifact == INDEX_FILE_NAME {
        return Err(PagewerkError::CacheIo(format!(
            "invalid artifact name {artifact:?}"
        )));
    }
    Ok(())
}
