// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Enhancement pipeline: grayscale normalization followed by the enabled
// optional stages, always in the fixed stage order.

use image::{DynamicImage, GrayImage};
use pagewerk_core::config::StageSettings;
use pagewerk_core::error::{PagewerkError, Result};
use pagewerk_core::types::StageName;
use tracing::{debug, info, instrument};

use super::stages;

/// A validated, immutable stage configuration ready to enhance pages.
///
/// Building the pipeline validates every stage block once, enabled or not,
/// so [`EnhancementPipeline::apply`] can only end early when its stop check
/// asks it to. The pipeline is `Send + Sync` and can be shared between page
/// workers behind an `Arc`.
///
/// ```ignore
/// let mut settings = StageSettings::default();
/// settings.binarization.enabled = true;
/// let pipeline = EnhancementPipeline::new(settings)?;
/// let page = pipeline.apply(image::open("page_001.png")?, &|| false)?;
/// ```
#[derive(Debug, Clone)]
pub struct EnhancementPipeline {
    settings: StageSettings,
}

impl EnhancementPipeline {
    // -- Construction ---------------------------------------------------------

    /// Validate `settings` and build a pipeline from them.
    ///
    /// Returns `ConfigValidation` naming the first offending stage and field.
    pub fn new(settings: StageSettings) -> Result<Self> {
        settings.validate()?;
        let pipeline = Self { settings };
        info!(stages = ?pipeline.enabled_stages(), "Enhancement pipeline configured");
        Ok(pipeline)
    }

    // -- Accessors ------------------------------------------------------------

    pub fn settings(&self) -> &StageSettings {
        &self.settings
    }

    /// Stages that will run, in execution order. Always starts with
    /// `Grayscale`.
    pub fn enabled_stages(&self) -> Vec<StageName> {
        self.settings
            .stages()
            .into_iter()
            .filter_map(|(stage, enabled)| enabled.then_some(stage))
            .collect()
    }

    // -- Execution ------------------------------------------------------------

    /// Run the enabled stages over one page.
    ///
    /// `stop` is polled before every stage and inside the long-running
    /// stages; once it reports `true` the page is abandoned with
    /// `Cancelled`.
    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    pub fn apply(&self, image: DynamicImage, stop: &dyn Fn() -> bool) -> Result<GrayImage> {
        let mut page = stages::to_grayscale(image);

        for stage in self.enabled_stages() {
            if stop() {
                debug!(%stage, "Stopped before stage");
                return Err(PagewerkError::Cancelled);
            }
            page = self
                .apply_stage(stage, page, stop)
                .ok_or(PagewerkError::Cancelled)?;
            debug!(%stage, "Stage applied");
        }

        Ok(page)
    }

    /// `None` when a stage was stopped part-way.
    fn apply_stage(&self, stage: StageName, page: GrayImage, stop: &dyn Fn() -> bool) -> Option<GrayImage> {
        let s = &self.settings;
        let next = match stage {
            StageName::Grayscale => page,
            StageName::Denoising => stages::denoise_nl_means(
                &page,
                s.denoising.h,
                s.denoising.template_window_size,
                s.denoising.search_window_size,
                stop,
            )?,
            StageName::Clahe => stages::clahe(&page, s.clahe.clip_limit, s.clahe.tile_grid_size),
            StageName::Contrast => stages::scale_contrast(&page, s.contrast.alpha, s.contrast.beta),
            StageName::Sharpening => stages::unsharp_mask(
                &page,
                s.sharpening.sigma,
                s.sharpening.amount,
                s.sharpening.gaussian_weight,
            ),
            StageName::Binarization => stages::adaptive_threshold(
                &page,
                s.binarization.block_size,
                s.binarization.c,
                stop,
            )?,
        };
        Some(next)
    }
}

// -- Tests --------------------------------------------------------------------
