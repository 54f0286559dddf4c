// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Enhancement service: the content-addressed cache in front of the document
// orchestrator.
//
// A request is keyed by the digest of the source bytes combined with the
// stage settings and resolution, so identical content processed identically
// is served from the cache without rasterizing anything.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use pagewerk_bridge::{Assembler, Rasterizer};
use pagewerk_cache::{ContentCache, Digest, digest_file};
use pagewerk_core::config::PipelineConfig;
use pagewerk_core::error::{PagewerkError, Result};
use pagewerk_core::types::RunReport;
use tracing::{debug, info, instrument, warn};

use crate::cancel::CancelToken;
use crate::orchestrator::DocumentOrchestrator;

/// Hex characters of the cache key used in artifact file names.
const ARTIFACT_KEY_PREFIX: usize = 16;

/// Result of one enhancement request.
#[derive(Debug, Clone)]
pub struct EnhanceOutcome {
    /// Enhanced document inside the storage root.
    pub artifact: PathBuf,
    /// SHA-256 of the source bytes.
    pub digest: Digest,
    /// Cache key: the content digest combined with the processing settings.
    pub cache_key: Digest,
    pub cache_hit: bool,
    /// Present when the pipeline actually ran.
    pub report: Option<RunReport>,
}

/// Cache-fronted entry point for enhancing documents.
///
/// Safe to share between concurrent requests (`Arc<EnhancementService<..>>`).
/// Requests for the same key are serialized so a document is never processed
/// twice concurrently; requests for different keys run in parallel.
pub struct EnhancementService<R, A> {
    orchestrator: DocumentOrchestrator<R, A>,
    cache: ContentCache,
    settings_fingerprint: String,
    key_locks: Mutex<HashMap<Digest, Arc<tokio::sync::Mutex<()>>>>,
}

impl<R: Rasterizer, A: Assembler> EnhancementService<R, A> {
    /// Validate `config`, open the cache in its storage root, and wire the
    /// collaborators.
    pub fn new(config: PipelineConfig, rasterizer: R, assembler: A) -> Result<Self> {
        let settings_fingerprint = format!(
            "{}|resolution={}",
            config.stages.fingerprint(),
            config.resolution
        );
        let cache = ContentCache::open(&config.storage_root)?;
        let orchestrator = DocumentOrchestrator::new(config, rasterizer, assembler)?;
        Ok(Self {
            orchestrator,
            cache,
            settings_fingerprint,
            key_locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn cache(&self) -> &ContentCache {
        &self.cache
    }

    pub fn orchestrator(&self) -> &DocumentOrchestrator<R, A> {
        &self.orchestrator
    }

    /// Key under which results for `content` are cached with the current
    /// settings.
    pub fn cache_key(&self, content: &Digest) -> Digest {
        content.combine(&self.settings_fingerprint)
    }

    /// Enhance `source`, reusing a cached result when one exists.
    #[instrument(skip_all, fields(source = %source.display()))]
    pub async fn enhance(&self, source: &Path, cancel: &CancelToken) -> Result<EnhanceOutcome> {
        let digest = digest_source(source).await?;
        let cache_key = self.cache_key(&digest);
        debug!(%digest, %cache_key, "Source digested");

        let lock = self.key_lock(&cache_key);
        let outcome = {
            let _guard = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(PagewerkError::Cancelled),
                guard = lock.lock() => guard,
            };
            self.enhance_locked(source, digest, cache_key.clone(), cancel).await
        };
        drop(lock);
        self.release_key_lock(&cache_key);
        outcome
    }

    async fn enhance_locked(
        &self,
        source: &Path,
        digest: Digest,
        cache_key: Digest,
        cancel: &CancelToken,
    ) -> Result<EnhanceOutcome> {
        if let Some(artifact) = self.cache.lookup(&cache_key) {
            info!(artifact = %artifact.display(), "Cache hit");
            return Ok(EnhanceOutcome {
                artifact,
                digest,
                cache_key,
                cache_hit: true,
                report: None,
            });
        }

        let name = artifact_name(&cache_key);
        let output = self.cache.artifact_path(&name);
        info!(artifact = %name, "Cache miss, running pipeline");
        let report = self.orchestrator.run(source, &output, cancel).await?;

        if let Err(err) = self.cache.store(&cache_key, &name) {
            warn!(error = %err, "Result not cached; the next request will reprocess");
        }

        Ok(EnhanceOutcome {
            artifact: report.output.clone(),
            digest,
            cache_key,
            cache_hit: false,
            report: Some(report),
        })
    }

    // -- Per-key locks --------------------------------------------------------

    fn key_lock(&self, key: &Digest) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.key_locks.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(locks.entry(key.clone()).or_default())
    }

    /// Drop the lock entry once no request holds or waits on it.
    fn release_key_lock(&self, key: &Digest) {
        let mut locks = self.key_locks.lock().unwrap_or_else(|e| e.into_inner());
        if locks.get(key).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(key);
        }
    }
}

/// File name of the enhanced artifact for a cache key.
pub fn artifact_name(cache_key: &Digest) -> String {
    format!("enhanced_{}.pdf", cache_key.prefix(ARTIFACT_KEY_PREFIX))
}

async fn digest_source(source: &Path) -> Result<Digest> {
    let path = source.to_path_buf();
    let unreadable = |detail: String| PagewerkError::SourceUnreadable {
        path: source.to_path_buf(),
        detail,
    };
    tokio::task::spawn_blocking(move || digest_file(&path))
        .await
        .map_err(|err| unreadable(format!("digest task failed: {err}")))?
        .map_err(|err| unreadable(err.to_string()))
}
