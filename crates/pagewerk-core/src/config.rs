// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pipeline configuration: one block per enhancement stage plus the run-wide
// settings. Defaults are enumerated here and nowhere else.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{PagewerkError, Result};
use crate::types::{PagePolicy, StageName};

/// Non-local-means denoising.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DenoiseConfig {
    pub enabled: bool,
    /// Filter strength; larger values smooth more.
    pub h: f32,
    /// Side of the patch compared between pixels (odd).
    pub template_window_size: u32,
    /// Side of the neighbourhood searched for similar patches (odd).
    pub search_window_size: u32,
}

impl Default for DenoiseConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            h: 10.0,
            template_window_size: 7,
            search_window_size: 21,
        }
    }
}

impl DenoiseConfig {
    pub fn validate(&self) -> Result<()> {
        let stage = StageName::Denoising;
        if !self.h.is_finite() || self.h <= 0.0 {
            return Err(PagewerkError::invalid(
                stage,
                "h",
                format!("must be a positive number, got {}", self.h),
            ));
        }
        odd_positive(stage, "template_window_size", self.template_window_size)?;
        odd_positive(stage, "search_window_size", self.search_window_size)?;
        if self.search_window_size < self.template_window_size {
            return Err(PagewerkError::invalid(
                stage,
                "search_window_size",
                format!(
                    "must be at least template_window_size ({}), got {}",
                    self.template_window_size, self.search_window_size
                ),
            ));
        }
        Ok(())
    }
}

/// Contrast-limited adaptive histogram equalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClaheConfig {
    pub enabled: bool,
    /// Per-tile histogram clip limit; 0 disables clipping.
    pub clip_limit: f64,
    /// Tile grid as `[columns, rows]`.
    pub tile_grid_size: [u32; 2],
}

impl Default for ClaheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            clip_limit: 3.0,
            tile_grid_size: [24, 24],
        }
    }
}

impl ClaheConfig {
    pub fn validate(&self) -> Result<()> {
        let stage = StageName::Clahe;
        if !self.clip_limit.is_finite() || self.clip_limit < 0.0 {
            return Err(PagewerkError::invalid(
                stage,
                "clip_limit",
                format!("must be a non-negative number, got {}", self.clip_limit),
            ));
        }
        if self.tile_grid_size.contains(&0) {
            return Err(PagewerkError::invalid(
                stage,
                "tile_grid_size",
                format!(
                    "both dimensions must be positive, got {}x{}",
                    self.tile_grid_size[0], self.tile_grid_size[1]
                ),
            ));
        }
        Ok(())
    }
}

/// Global affine remap `alpha * x + beta`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContrastConfig {
    pub enabled: bool,
    pub alpha: f64,
    pub beta: f64,
}

impl Default for ContrastConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            alpha: 1.5,
            beta: 0.0,
        }
    }
}

impl ContrastConfig {
    pub fn validate(&self) -> Result<()> {
        let stage = StageName::Contrast;
        if !self.alpha.is_finite() || self.alpha <= 0.0 {
            return Err(PagewerkError::invalid(
                stage,
                "alpha",
                format!("must be a positive number, got {}", self.alpha),
            ));
        }
        finite(stage, "beta", self.beta)
    }
}

/// Unsharp masking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SharpenConfig {
    pub enabled: bool,
    /// Gaussian sigma of the blur that is subtracted.
    pub sigma: f32,
    /// Weight of the original image.
    pub amount: f64,
    /// Weight of the blurred image, normally negative.
    pub gaussian_weight: f64,
}

impl Default for SharpenConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            sigma: 0.8,
            amount: 1.0,
            gaussian_weight: -0.1,
        }
    }
}

impl SharpenConfig {
    pub fn validate(&self) -> Result<()> {
        let stage = StageName::Sharpening;
        if !self.sigma.is_finite() || self.sigma <= 0.0 {
            return Err(PagewerkError::invalid(
                stage,
                "sigma",
                format!("must be a positive number, got {}", self.sigma),
            ));
        }
        finite(stage, "amount", self.amount)?;
        finite(stage, "gaussian_weight", self.gaussian_weight)
    }
}

/// Adaptive Gaussian thresholding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BinarizeConfig {
    pub enabled: bool,
    /// Side of the neighbourhood used for the local mean (odd, >= 3).
    pub block_size: u32,
    /// Constant subtracted from the local mean.
    pub c: f64,
}

impl Default for BinarizeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            block_size: 11,
            c: 2.0,
        }
    }
}

impl BinarizeConfig {
    pub fn validate(&self) -> Result<()> {
        let stage = StageName::Binarization;
        if self.block_size < 3 || self.block_size % 2 == 0 {
            return Err(PagewerkError::invalid(
                stage,
                "block_size",
                format!("must be an odd number >= 3, got {}", self.block_size),
            ));
        }
        finite(stage, "c", self.c)
    }
}

/// All stage blocks of the enhancement pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageSettings {
    pub denoising: DenoiseConfig,
    pub clahe: ClaheConfig,
    pub contrast: ContrastConfig,
    pub sharpening: SharpenConfig,
    pub binarization: BinarizeConfig,
}

impl StageSettings {
    /// `(stage, enabled)` pairs in execution order.
    pub fn stages(&self) -> [(StageName, bool); 6] {
        StageName::ORDER.map(|stage| (stage, self.is_enabled(stage)))
    }

    /// Whether `stage` will run. Grayscale normalization always runs.
    pub fn is_enabled(&self, stage: StageName) -> bool {
        match stage {
            StageName::Grayscale => true,
            StageName::Denoising => self.denoising.enabled,
            StageName::Clahe => self.clahe.enabled,
            StageName::Contrast => self.contrast.enabled,
            StageName::Sharpening => self.sharpening.enabled,
            StageName::Binarization => self.binarization.enabled,
        }
    }

    /// Switch an optional stage on or off. Grayscale cannot be disabled.
    pub fn set_enabled(&mut self, stage: StageName, enabled: bool) {
        match stage {
            StageName::Grayscale => {}
            StageName::Denoising => self.denoising.enabled = enabled,
            StageName::Clahe => self.clahe.enabled = enabled,
            StageName::Contrast => self.contrast.enabled = enabled,
            StageName::Sharpening => self.sharpening.enabled = enabled,
            StageName::Binarization => self.binarization.enabled = enabled,
        }
    }

    /// Whether any optional stage is enabled.
    pub fn any_enabled(&self) -> bool {
        self.stages()
            .iter()
            .any(|(stage, enabled)| stage.is_optional() && *enabled)
    }

    /// Validate every block, enabled or not, in stage order.
    pub fn validate(&self) -> Result<()> {
        self.denoising.validate()?;
        self.clahe.validate()?;
        self.contrast.validate()?;
        self.sharpening.validate()?;
        self.binarization.validate()
    }

    /// Stable textual form of the settings, used to key cached results.
    pub fn fingerprint(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Complete configuration for a document run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    #[serde(flatten)]
    pub stages: StageSettings,
    /// Rasterization resolution in dots per inch.
    pub resolution: u32,
    /// Root directory for scratch space, enhanced artifacts, and the cache index.
    pub storage_root: PathBuf,
    /// Whether failed pages are left out or fail the run.
    pub page_policy: PagePolicy,
    /// Pages processed concurrently. `None` uses one worker per CPU core.
    pub concurrency: Option<usize>,
    /// Upper bound for a single page-count or rasterize call.
    pub page_timeout_secs: u64,
    /// Upper bound for the assembly call.
    pub assembly_timeout_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            stages: StageSettings::default(),
            resolution: 400,
            storage_root: PathBuf::from("uploads"),
            page_policy: PagePolicy::SkipFailed,
            concurrency: None,
            page_timeout_secs: 120,
            assembly_timeout_secs: 300,
        }
    }
}

impl PipelineConfig {
    /// Load a configuration from a JSON file. Missing fields take defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text)?;
        Ok(config)
    }

    /// Validate the stage blocks and the run-wide settings.
    pub fn validate(&self) -> Result<()> {
        self.stages.validate()?;
        if self.resolution == 0 {
            return Err(PagewerkError::invalid_setting(
                "resolution",
                "must be a positive DPI value",
            ));
        }
        if self.concurrency == Some(0) {
            return Err(PagewerkError::invalid_setting(
                "concurrency",
                "must be at least 1",
            ));
        }
        if self.page_timeout_secs == 0 {
            return Err(PagewerkError::invalid_setting(
                "page_timeout_secs",
                "must be positive",
            ));
        }
        if self.assembly_timeout_secs == 0 {
            return Err(PagewerkError::invalid_setting(
                "assembly_timeout_secs",
                "must be positive",
            ));
        }
        Ok(())
    }

    pub fn page_timeout(&self) -> Duration {
        Duration::from_secs(self.page_timeout_secs)
    }

    pub fn assembly_timeout(&self) -> Duration {
        Duration::from_secs(self.assembly_timeout_secs)
    }

    /// Scratch directory for per-run page artifacts.
    pub fn scratch_dir(&self) -> PathBuf {
        self.storage_root.join("tmp")
    }
}

fn odd_positive(stage: StageName, field: &'static str, value: u32) -> Result<()> {
    if value == 0 || value % 2 == 0 {
        return Err(PagewerkError::invalid(
            stage,
            field,
            format!("must be a positive odd number, got {value}"),
        ));
    }
    Ok(())
}

fn finite(stage: StageName, field: &'static str, value: f64) -> Result<()> {
    if !value.is_finite() {
        return Err(PagewerkError::invalid(
            stage,
            field,
            format!("must be finite, got {value}"),
        ));
    }
    Ok(())
}
