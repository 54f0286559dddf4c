// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Document orchestrator: rasterize every page, enhance it, and assemble the
// enhanced pages into one output document.
//
// Pages are independent. A page that cannot be rasterized or enhanced is
// recorded as failed and never aborts its siblings; what happens to the
// output then depends on the configured page policy. The per-run scratch
// workspace is removed on every exit path.

use std::path::Path;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use pagewerk_bridge::{Assembler, Rasterizer};
use pagewerk_core::config::PipelineConfig;
use pagewerk_core::error::{PagewerkError, Result};
use pagewerk_core::types::{PageFailure, PagePolicy, PageResult, RunReport, RunState};
use pagewerk_document::EnhancementPipeline;
use pagewerk_document::image::save_png;
use tracing::{debug, error, info, instrument, warn};

use crate::cancel::{CancelToken, guarded};
use crate::workspace::RunWorkspace;

/// Runs documents through rasterize → enhance → assemble.
///
/// Holds a validated configuration; construction fails on invalid stage
/// settings before any document is touched.
pub struct DocumentOrchestrator<R, A> {
    config: PipelineConfig,
    pipeline: Arc<EnhancementPipeline>,
    rasterizer: R,
    assembler: A,
    concurrency: usize,
}

impl<R: Rasterizer, A: Assembler> DocumentOrchestrator<R, A> {
    // -- Construction ---------------------------------------------------------

    pub fn new(config: PipelineConfig, rasterizer: R, assembler: A) -> Result<Self> {
        config.validate()?;
        let pipeline = Arc::new(EnhancementPipeline::new(config.stages.clone())?);
        let concurrency = config.concurrency.unwrap_or_else(num_cpus::get).max(1);
        info!(
            concurrency,
            resolution = config.resolution,
            policy = ?config.page_policy,
            "Document orchestrator ready"
        );
        Ok(Self {
            config,
            pipeline,
            rasterizer,
            assembler,
            concurrency,
        })
    }

    // -- Accessors ------------------------------------------------------------

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn rasterizer(&self) -> &R {
        &self.rasterizer
    }

    pub fn assembler(&self) -> &A {
        &self.assembler
    }

    /// Maximum number of pages in flight.
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    // -- Execution ------------------------------------------------------------

    /// Enhance `source` into `output`.
    ///
    /// Fatal outcomes: `SourceUnreadable` (no page count, or zero pages),
    /// `NoPagesProduced`, `IncompleteDocument` under `require_all`,
    /// `Assembly` (partial output removed), `Timeout` of the page count or
    /// the assembly, and `Cancelled`.
    #[instrument(skip_all, fields(source = %source.display(), output = %output.display()))]
    pub async fn run(&self, source: &Path, output: &Path, cancel: &CancelToken) -> Result<RunReport> {
        log_state(RunState::Start);
        let workspace = RunWorkspace::create(&self.config.scratch_dir())?;

        let result = self.run_in(&workspace, source, output, cancel).await;
        workspace.cleanup();

        match &result {
            Ok(report) => {
                log_state(RunState::Done);
                info!(
                    pages = report.page_count,
                    enhanced = report.enhanced_pages.len(),
                    failed = report.failed_pages.len(),
                    "Run complete"
                );
            }
            Err(err) => {
                log_state(RunState::Failed);
                error!(error = %err, "Run failed");
            }
        }
        result
    }

    async fn run_in(
        &self,
        workspace: &RunWorkspace,
        source: &Path,
        output: &Path,
        cancel: &CancelToken,
    ) -> Result<RunReport> {
        let page_count = guarded(
            "page count",
            self.config.page_timeout(),
            cancel,
            self.rasterizer.page_count(source),
        )
        .await?;
        if page_count == 0 {
            return Err(PagewerkError::SourceUnreadable {
                path: source.to_path_buf(),
                detail: "document has no pages".into(),
            });
        }
        info!(page_count, "Source opened");

        // Every page future runs to completion, so no enhancement task is
        // left writing into the workspace once this returns.
        let outcomes: Vec<Result<PageResult>> = stream::iter(1..=page_count)
            .map(|page| self.process_page(page, source, workspace, cancel))
            .buffer_unordered(self.concurrency)
            .collect()
            .await;
        let mut results = outcomes.into_iter().collect::<Result<Vec<_>>>()?;
        results.sort_by_key(PageResult::page);

        let mut enhanced_pages = Vec::new();
        let mut artifacts = Vec::new();
        let mut failures = Vec::new();
        for result in results {
            match result {
                PageResult::Enhanced { page, artifact } => {
                    enhanced_pages.push(page);
                    artifacts.push(artifact);
                }
                PageResult::Failed(failure) => failures.push(failure),
            }
        }

        if artifacts.is_empty() {
            return Err(PagewerkError::NoPagesProduced { failures });
        }
        if self.config.page_policy == PagePolicy::RequireAll && !failures.is_empty() {
            return Err(PagewerkError::IncompleteDocument { failures });
        }
        if !failures.is_empty() {
            warn!(
                failed = failures.len(),
                "Assembling without failed pages"
            );
        }

        log_state(RunState::Assembling);
        let assembled = guarded(
            "assembly",
            self.config.assembly_timeout(),
            cancel,
            self.assembler.assemble(&artifacts, output),
        )
        .await;

        match assembled {
            Ok(path) => Ok(RunReport {
                output: path,
                page_count,
                enhanced_pages,
                failed_pages: failures,
            }),
            Err(err) => {
                remove_partial_output(output);
                Err(match err {
                    PagewerkError::Assembly(_)
                    | PagewerkError::Cancelled
                    | PagewerkError::Timeout { .. } => err,
                    other => PagewerkError::Assembly(other.to_string()),
                })
            }
        }
    }

    /// Rasterize and enhance one page. Only cancellation is returned as an
    /// error; every other failure becomes [`PageResult::Failed`].
    ///
    /// The enhancement task polls `cancel` and is always awaited, so it has
    /// stopped by the time this returns.
    async fn process_page(
        &self,
        page: u32,
        source: &Path,
        workspace: &RunWorkspace,
        cancel: &CancelToken,
    ) -> Result<PageResult> {
        log_state(RunState::Rasterizing(page));
        let operation = format!("rasterize page {page}");
        let image = match guarded(
            &operation,
            self.config.page_timeout(),
            cancel,
            self.rasterizer.rasterize(source, page, self.config.resolution),
        )
        .await
        {
            Ok(image) => image,
            Err(PagewerkError::Cancelled) => return Err(PagewerkError::Cancelled),
            Err(err) => return Ok(page_failed(page, err)),
        };

        log_state(RunState::Enhancing(page));
        let pipeline = Arc::clone(&self.pipeline);
        let artifact = workspace.page_path(page);
        let target = artifact.clone();
        let token = cancel.clone();
        let joined = tokio::task::spawn_blocking(move || {
            let enhanced = pipeline.apply(image, &|| token.is_cancelled())?;
            save_png(&enhanced, &target)
        })
        .await;

        match joined {
            Ok(Ok(())) => {
                debug!(page, artifact = %artifact.display(), "Page enhanced");
                Ok(PageResult::Enhanced { page, artifact })
            }
            Ok(Err(PagewerkError::Cancelled)) => Err(PagewerkError::Cancelled),
            Ok(Err(err)) => Ok(page_failed(page, err)),
            Err(join_err) => Ok(page_failed(
                page,
                PagewerkError::PageProcessing {
                    page,
                    detail: format!("enhancement task failed: {join_err}"),
                },
            )),
        }
    }
}

/// Record `err` as the page's `PageProcessing` failure.
fn page_failed(page: u32, err: PagewerkError) -> PageResult {
    let detail = match err {
        PagewerkError::PageProcessing { detail, .. } => detail,
        PagewerkError::SourceUnreadable { detail, .. } => format!("rasterization failed: {detail}"),
        other => other.to_string(),
    };
    let failure = PageFailure::new(page, detail);
    warn!(page, error = %failure.to_error(), "Page failed");
    PageResult::Failed(failure)
}

fn log_state(state: RunState) {
    match state {
        RunState::Rasterizing(_) | RunState::Enhancing(_) => debug!(%state, "Run state"),
        _ => info!(%state, "Run state"),
    }
}

fn remove_partial_output(output: &Path) {
    if !output.exists() {
        return;
    }
    match std::fs::remove_file(output) {
        Ok(()) => debug!(output = %output.display(), "Partial output removed"),
        Err(err) => warn!(output = %output.display(), error = %err, "Failed to remove partial output"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeRasterizer, RecordingAssembler};
    use std::path::PathBuf;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    fn config_in(root: &Path) -> PipelineConfig {
        PipelineConfig {
            storage_root: root.to_path_buf(),
            concurrency: Some(3),
            ..PipelineConfig::default()
        }
    }

    fn scratch_is_empty(config: &PipelineConfig) -> bool {
        match std::fs::read_dir(config.scratch_dir()) {
            Ok(mut entries) => entries.next().is_none(),
            Err(_) => true,
        }
    }

    fn page_names(paths: &[PathBuf]) -> Vec<String> {
        paths
            .iter()
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect()
    }

    #[tokio::test]
    async fn all_pages_assembled_in_order() {
        let root = tempfile::tempdir().expect("tempdir");
        let config = config_in(root.path());
        let orchestrator = DocumentOrchestrator::new(
            config.clone(),
            FakeRasterizer::new(5),
            RecordingAssembler::new(),
        )
        .expect("orchestrator");

        let output = root.path().join("out.pdf");
        let report = orchestrator
            .run(Path::new("scan.pdf"), &output, &CancelToken::new())
            .await
            .expect("run");

        assert_eq!(report.page_count, 5);
        assert_eq!(report.enhanced_pages, vec![1, 2, 3, 4, 5]);
        assert!(report.is_complete());
        let calls = orchestrator.assembler().calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            page_names(&calls[0]),
            ["page_001.png", "page_002.png", "page_003.png", "page_004.png", "page_005.png"]
        );
        assert!(scratch_is_empty(&config));
    }

    #[tokio::test]
    async fn one_bad_page_among_six_is_skipped() {
        let root = tempfile::tempdir().expect("tempdir");
        let config = config_in(root.path());
        let orchestrator = DocumentOrchestrator::new(
            config.clone(),
            FakeRasterizer::new(6).failing_on(4),
            RecordingAssembler::new(),
        )
        .expect("orchestrator");

        let report = orchestrator
            .run(Path::new("scan.pdf"), &root.path().join("out.pdf"), &CancelToken::new())
            .await
            .expect("run");

        assert_eq!(report.failed_pages.len(), 1);
        let failure = &report.failed_pages[0];
        assert_eq!(failure.page, 4);
        assert!(failure.cause.contains("simulated render failure on page 4"));
        assert!(!failure.cause.contains("unreadable"));
        assert!(matches!(
            failure.to_error(),
            PagewerkError::PageProcessing { page: 4, .. }
        ));
        assert_eq!(report.enhanced_pages, vec![1, 2, 3, 5, 6]);
        let calls = orchestrator.assembler().calls();
        assert_eq!(
            page_names(&calls[0]),
            ["page_001.png", "page_002.png", "page_003.png", "page_005.png", "page_006.png"]
        );
        assert!(scratch_is_empty(&config));
    }

    #[tokio::test]
    async fn require_all_rejects_incomplete_document() {
        let root = tempfile::tempdir().expect("tempdir");
        let config = PipelineConfig {
            page_policy: PagePolicy::RequireAll,
            ..config_in(root.path())
        };
        let orchestrator = DocumentOrchestrator::new(
            config.clone(),
            FakeRasterizer::new(3).failing_on(2),
            RecordingAssembler::new(),
        )
        .expect("orchestrator");

        let result = orchestrator
            .run(Path::new("scan.pdf"), &root.path().join("out.pdf"), &CancelToken::new())
            .await;

        match result {
            Err(PagewerkError::IncompleteDocument { failures }) => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].page, 2);
            }
            other => panic!("expected IncompleteDocument, got {other:?}"),
        }
        assert!(orchestrator.assembler().calls().is_empty());
        assert!(scratch_is_empty(&config));
    }

    #[tokio::test]
    async fn no_successful_page_is_no_pages_produced() {
        let root = tempfile::tempdir().expect("tempdir");
        let orchestrator = DocumentOrchestrator::new(
            config_in(root.path()),
            FakeRasterizer::new(2).failing_on(1).failing_on(2),
            RecordingAssembler::new(),
        )
        .expect("orchestrator");

        let result = orchestrator
            .run(Path::new("scan.pdf"), &root.path().join("out.pdf"), &CancelToken::new())
            .await;
        assert!(matches!(
            result,
            Err(PagewerkError::NoPagesProduced { ref failures }) if failures.len() == 2
        ));
        assert!(orchestrator.assembler().calls().is_empty());
    }

    #[tokio::test]
    async fn zero_pages_is_source_unreadable() {
        let root = tempfile::tempdir().expect("tempdir");
        let orchestrator = DocumentOrchestrator::new(
            config_in(root.path()),
            FakeRasterizer::new(0),
            RecordingAssembler::new(),
        )
        .expect("orchestrator");

        let result = orchestrator
            .run(Path::new("empty.pdf"), &root.path().join("out.pdf"), &CancelToken::new())
            .await;
        assert!(matches!(result, Err(PagewerkError::SourceUnreadable { .. })));
        assert_eq!(orchestrator.rasterizer().rasterize_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unreadable_source_propagates() {
        let root = tempfile::tempdir().expect("tempdir");
        let config = config_in(root.path());
        let orchestrator = DocumentOrchestrator::new(
            config.clone(),
            FakeRasterizer::new(4).unreadable(),
            RecordingAssembler::new(),
        )
        .expect("orchestrator");

        let result = orchestrator
            .run(Path::new("broken.pdf"), &root.path().join("out.pdf"), &CancelToken::new())
            .await;
        assert!(matches!(result, Err(PagewerkError::SourceUnreadable { .. })));
        assert!(scratch_is_empty(&config));
    }

    #[tokio::test]
    async fn binarized_pages_are_two_valued() {
        let root = tempfile::tempdir().expect("tempdir");
        let mut config = PipelineConfig {
            resolution: 300,
            ..config_in(root.path())
        };
        config.stages.binarization.enabled = true;
        config.stages.binarization.block_size = 11;
        config.stages.binarization.c = 2.0;

        let orchestrator = DocumentOrchestrator::new(
            config,
            FakeRasterizer::new(3),
            RecordingAssembler::new(),
        )
        .expect("orchestrator");

        let report = orchestrator
            .run(Path::new("scan.pdf"), &root.path().join("out.pdf"), &CancelToken::new())
            .await
            .expect("run");

        assert_eq!(report.enhanced_pages.len(), 3);
        let images = orchestrator.assembler().images();
        assert_eq!(images.len(), 3);
        for image in images {
            assert!(image.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
        }
    }

    #[tokio::test]
    async fn sequential_mode_matches_concurrent() {
        let root = tempfile::tempdir().expect("tempdir");
        let config = PipelineConfig {
            concurrency: Some(1),
            ..config_in(root.path())
        };
        let orchestrator = DocumentOrchestrator::new(
            config,
            FakeRasterizer::new(4).failing_on(3),
            RecordingAssembler::new(),
        )
        .expect("orchestrator");
        assert_eq!(orchestrator.concurrency(), 1);

        let report = orchestrator
            .run(Path::new("scan.pdf"), &root.path().join("out.pdf"), &CancelToken::new())
            .await
            .expect("run");
        assert_eq!(report.enhanced_pages, vec![1, 2, 4]);
    }

    #[tokio::test]
    async fn assembly_failure_removes_partial_output() {
        let root = tempfile::tempdir().expect("tempdir");
        let config = config_in(root.path());
        let orchestrator = DocumentOrchestrator::new(
            config.clone(),
            FakeRasterizer::new(2),
            RecordingAssembler::failing(),
        )
        .expect("orchestrator");

        let output = root.path().join("out.pdf");
        let result = orchestrator
            .run(Path::new("scan.pdf"), &output, &CancelToken::new())
            .await;
        assert!(matches!(result, Err(PagewerkError::Assembly(_))));
        assert!(!output.exists());
        assert!(scratch_is_empty(&config));
    }

    #[tokio::test]
    async fn hanging_page_times_out_and_is_skipped() {
        let root = tempfile::tempdir().expect("tempdir");
        let config = PipelineConfig {
            page_timeout_secs: 1,
            ..config_in(root.path())
        };
        let orchestrator = DocumentOrchestrator::new(
            config,
            FakeRasterizer::new(3).hanging_on(2),
            RecordingAssembler::new(),
        )
        .expect("orchestrator");

        let report = orchestrator
            .run(Path::new("scan.pdf"), &root.path().join("out.pdf"), &CancelToken::new())
            .await
            .expect("run");
        assert_eq!(report.enhanced_pages, vec![1, 3]);
        assert_eq!(report.failed_pages[0].page, 2);
        assert!(report.failed_pages[0].cause.contains("timed out"));
    }

    #[tokio::test]
    async fn cancellation_aborts_and_cleans_up() {
        let root = tempfile::tempdir().expect("tempdir");
        let config = config_in(root.path());
        let orchestrator = DocumentOrchestrator::new(
            config.clone(),
            FakeRasterizer::new(4).hanging_on(1).hanging_on(2).hanging_on(3),
            RecordingAssembler::new(),
        )
        .expect("orchestrator");

        let cancel = CancelToken::new();
        let remote = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            remote.cancel();
        });

        let result = orchestrator
            .run(Path::new("scan.pdf"), &root.path().join("out.pdf"), &cancel)
            .await;
        assert!(matches!(result, Err(PagewerkError::Cancelled)));
        assert!(orchestrator.assembler().calls().is_empty());
        assert!(scratch_is_empty(&config));
    }

    #[tokio::test]
    async fn cancellation_stops_running_enhancement() {
        let root = tempfile::tempdir().expect("tempdir");
        let mut config = PipelineConfig {
            concurrency: Some(1),
            ..config_in(root.path())
        };
        config.stages.denoising.enabled = true;
        config.stages.denoising.search_window_size = 35;
        let orchestrator = DocumentOrchestrator::new(
            config.clone(),
            FakeRasterizer::new(1).with_page_size(1600, 1600),
            RecordingAssembler::new(),
        )
        .expect("orchestrator");

        let cancel = CancelToken::new();
        let remote = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            remote.cancel();
        });

        let started = std::time::Instant::now();
        let result = orchestrator
            .run(Path::new("scan.pdf"), &root.path().join("out.pdf"), &cancel)
            .await;
        assert!(matches!(result, Err(PagewerkError::Cancelled)));
        // Denoising this page takes far longer than the bound when not stopped.
        assert!(started.elapsed() < Duration::from_secs(5));
        assert!(orchestrator.assembler().calls().is_empty());
        assert!(scratch_is_empty(&config));
    }

    #[test]
    fn invalid_settings_rejected_before_any_work() {
        let mut config = PipelineConfig::default();
        config.stages.clahe.tile_grid_size = [0, 8];
        let result = DocumentOrchestrator::new(config, FakeRasterizer::new(1), RecordingAssembler::new());
        assert!(matches!(result, Err(PagewerkError::ConfigValidation { .. })));
    }
}
