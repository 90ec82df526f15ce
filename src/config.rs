//! Unified configuration for the extraction pipeline.
//!
//! Every recognized option lives here with a documented default. The
//! pipeline validates the whole struct once at construction; stages never
//! merge defaults ad hoc.

use crate::error::{Error, Result};
use crate::ocr::PageSegMode;

/// Recognition quality mode.
///
/// Controls the render scale of full-page recognition passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QualityMode {
    /// Faster recognition at a moderate scale.
    #[default]
    Fast,
    /// Higher accuracy at a larger scale.
    HighAccuracy,
}

impl QualityMode {
    /// Render scale factor for this mode.
    pub fn scale(&self) -> f32 {
        match self {
            Self::Fast => 2.05,
            Self::HighAccuracy => 3.1,
        }
    }
}

/// Image-mask behavior for full-page passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MaskMode {
    /// Classify each region and mask only photo-like ones.
    #[default]
    Auto,
    /// Mask every image region.
    On,
    /// Never mask.
    Off,
}

/// Crop behavior for full-page passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CropMode {
    /// Crop when it trims a meaningful margin.
    #[default]
    Auto,
    /// Always crop to the content bounds.
    On,
    /// Never crop.
    Off,
}

/// Mask planning options.
#[derive(Debug, Clone)]
pub struct MaskOptions {
    /// Masking behavior. Default: [`MaskMode::Auto`].
    pub mode: MaskMode,
    /// Expansion margin around masked regions, in page units. Default: 3.0.
    pub margin: f32,
    /// Maximum mask regions per page. Default: 12.
    pub max_regions: usize,
}

impl Default for MaskOptions {
    fn default() -> Self {
        Self {
            mode: MaskMode::Auto,
            margin: 3.0,
            max_regions: 12,
        }
    }
}

/// Crop planning options.
#[derive(Debug, Clone)]
pub struct CropOptions {
    /// Crop behavior. Default: [`CropMode::Auto`].
    pub mode: CropMode,
    /// Padding around the content bounds, in page units. Default: 12.0.
    pub padding: f32,
}

impl Default for CropOptions {
    fn default() -> Self {
        Self {
            mode: CropMode::Auto,
            padding: 12.0,
        }
    }
}

/// Header-zone recognition options.
#[derive(Debug, Clone)]
pub struct HeaderOptions {
    /// Fraction of page height forming the header band. Valid range
    /// 0.2–0.35. Default: 0.25.
    pub fraction: f32,
    /// Extra scale applied to header passes on top of the quality scale.
    /// Valid range 1.0–3.0. Default: 1.6.
    pub scale_boost: f32,
    /// Segmentation modes tried, in order, for header pattern attempts.
    /// Default: `[SingleBlock, SingleColumn, SparseText]`.
    pub retry_modes: Vec<PageSegMode>,
}

impl Default for HeaderOptions {
    fn default() -> Self {
        Self {
            fraction: 0.25,
            scale_boost: 1.6,
            retry_modes: vec![
                PageSegMode::SingleBlock,
                PageSegMode::SingleColumn,
                PageSegMode::SparseText,
            ],
        }
    }
}

/// Targeted backfill options.
#[derive(Debug, Clone)]
pub struct BackfillOptions {
    /// Extra scale applied to band passes. Default: 2.4.
    pub scale_boost: f32,
    /// Signed bias added to the Otsu threshold. Default: 0.
    pub threshold_bias: i16,
    /// Whether to dilate strokes after binarization. Default: false.
    pub dilate: bool,
    /// Maximum band passes per page. Default: 14.
    pub max_bands: usize,
    /// Padding around each line band, in page units. Default: 4.0.
    pub band_padding: f32,
}

impl Default for BackfillOptions {
    fn default() -> Self {
        Self {
            scale_boost: 2.4,
            threshold_bias: 0,
            dilate: false,
            max_bands: 14,
            band_padding: 4.0,
        }
    }
}

/// Document gate thresholds.
#[derive(Debug, Clone)]
pub struct GateThresholds {
    /// Minimum completeness confidence for a page to pass without OCR.
    /// Default: 0.72.
    pub min_completeness_confidence: f32,
    /// Maximum contamination score for a page to pass without OCR.
    /// Default: 0.24.
    pub max_contamination_score: f32,
}

impl Default for GateThresholds {
    fn default() -> Self {
        Self {
            min_completeness_confidence: 0.72,
            max_contamination_score: 0.24,
        }
    }
}

/// Full pipeline configuration.
#[derive(Debug, Clone)]
pub struct ExtractionConfig {
    /// Recognition language tag. Default: `"eng"`.
    pub language: String,
    /// Quality mode controlling the base render scale. Default: Fast.
    pub quality: QualityMode,
    /// Base page-segmentation mode for body passes. Default: Auto.
    pub page_seg_mode: PageSegMode,
    /// Image masking options.
    pub mask: MaskOptions,
    /// Crop options.
    pub crop: CropOptions,
    /// Header-zone options.
    pub header: HeaderOptions,
    /// Backfill options.
    pub backfill: BackfillOptions,
    /// OCR lines overlapping a mask region by at least this fraction are
    /// suppressed as figure noise. Default: 0.55.
    pub figure_overlap_threshold: f32,
    /// Confidence (0–100) below which lines and words count as
    /// low-confidence in pass metrics. Default: 60.0.
    pub short_low_confidence_threshold: f32,
    /// Gate thresholds.
    pub gate: GateThresholds,
    /// Whether the assembler drops contaminated artifact tokens.
    /// Default: true.
    pub filter_contaminated: bool,
    /// Force full OCR on every page regardless of classification.
    /// Default: false.
    pub force_ocr_all: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            language: "eng".to_string(),
            quality: QualityMode::default(),
            page_seg_mode: PageSegMode::Auto,
            mask: MaskOptions::default(),
            crop: CropOptions::default(),
            header: HeaderOptions::default(),
            backfill: BackfillOptions::default(),
            figure_overlap_threshold: 0.55,
            short_low_confidence_threshold: 60.0,
            gate: GateThresholds::default(),
            filter_contaminated: true,
            force_ocr_all: false,
        }
    }
}

impl ExtractionConfig {
    /// Validate the configuration once, at pipeline construction.
    pub fn validate(&self) -> Result<()> {
        if self.language.trim().is_empty() {
            return Err(Error::InvalidConfig("language tag is empty".to_string()));
        }
        if !(0.2..=0.35).contains(&self.header.fraction) {
            return Err(Error::InvalidConfig(format!(
                "header fraction {} outside 0.2–0.35",
                self.header.fraction
            )));
        }
        if !(1.0..=3.0).contains(&self.header.scale_boost) {
            return Err(Error::InvalidConfig(format!(
                "header scale boost {} outside 1.0–3.0",
                self.header.scale_boost
            )));
        }
        if self.header.retry_modes.is_empty() {
            return Err(Error::InvalidConfig(
                "header retry mode list is empty".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.figure_overlap_threshold) {
            return Err(Error::InvalidConfig(format!(
                "figure overlap threshold {} outside 0–1",
                self.figure_overlap_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.gate.min_completeness_confidence)
            || !(0.0..=1.0).contains(&self.gate.max_contamination_score)
        {
            return Err(Error::InvalidConfig("gate thresholds outside 0–1".to_string()));
        }
        if self.backfill.scale_boost <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "backfill scale boost {} must be positive",
                self.backfill.scale_boost
            )));
        }
        Ok(())
    }

    /// Set the recognition language.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    /// Set the quality mode.
    pub fn with_quality(mut self, quality: QualityMode) -> Self {
        self.quality = quality;
        self
    }

    /// Force full OCR on every page.
    pub fn with_force_ocr_all(mut self, force: bool) -> Self {
        self.force_ocr_all = force;
        self
    }

    /// Set the gate thresholds.
    pub fn with_gate(mut self, gate: GateThresholds) -> Self {
        self.gate = gate;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_valid() {
        assert!(ExtractionConfig::default().validate().is_ok());
    }

    #[test]
    fn test_quality_scales() {
        assert_eq!(QualityMode::Fast.scale(), 2.05);
        assert_eq!(QualityMode::HighAccuracy.scale(), 3.1);
    }

    #[test]
    fn test_header_fraction_validated() {
        let mut config = ExtractionConfig::default();
        config.header.fraction = 0.5;
        assert!(config.validate().is_err());
        config.header.fraction = 0.2;
        assert!(config.validate().is_ok());
        config.header.fraction = 0.35;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_scale_boost_validated() {
        let mut config = ExtractionConfig::default();
        config.header.scale_boost = 4.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_language_rejected() {
        let config = ExtractionConfig::default().with_language("  ");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_builder_chain() {
        let config = ExtractionConfig::default()
            .with_language("deu")
            .with_quality(QualityMode::HighAccuracy)
            .with_force_ocr_all(true);
        assert_eq!(config.language, "deu");
        assert_eq!(config.quality, QualityMode::HighAccuracy);
        assert!(config.force_ocr_all);
    }

    #[test]
    fn test_gate_defaults() {
        let gate = GateThresholds::default();
        assert_eq!(gate.min_completeness_confidence, 0.72);
        assert_eq!(gate.max_contamination_score, 0.24);
    }
}
