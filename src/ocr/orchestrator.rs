//! Recognition pass orchestration.
//!
//! Drives one or more recognition passes per planned region, with adaptive
//! preprocessing, quality-scored retries, and a safety fallback when figure
//! suppression erases a substantial result.

use chrono::Datelike;
use image::GrayImage;
use lazy_static::lazy_static;
use regex::Regex;

use crate::cancel::CancelToken;
use crate::config::ExtractionConfig;
use crate::error::{Error, Result};
use crate::geometry::{intersection_area, Rect};
use crate::ocr::planner::{HeaderPlan, MaskPlan};
use crate::ocr::preprocess::{preprocess, Binarization};
use crate::ocr::quality::{pass_score, PassMetrics};
use crate::ocr::{lines_to_text, sort_reading_order, OcrLine, PageSegMode, RecognitionEngine};

/// Header attempt score for a valid date of birth.
const SCORE_DOB_VALID: f32 = 2.0;

/// Header attempt score for a plausible age.
const SCORE_AGE_VALID: f32 = 1.0;

/// Character count at which the header char contribution saturates.
const HEADER_CHAR_CEILING: f32 = 1400.0;

/// Cap on the header char contribution.
const HEADER_CHAR_CAP: f32 = 0.9;

/// Attempt score at which header retries stop early.
const HEADER_EARLY_EXIT_SCORE: f32 = 2.5;

/// Pre-suppression character count that makes a result "substantial".
const SUPPRESSION_SUBSTANTIAL_CHARS: usize = 140;

/// Post-suppression character count that counts as "erased".
const SUPPRESSION_ERASED_CHARS: usize = 32;

/// Maximum fallback passes in the quality retry ladder.
const MAX_LADDER_FALLBACKS: usize = 3;

lazy_static! {
    static ref DATE_PATTERN: Regex =
        Regex::new(r"\b(\d{1,2})[/\-.](\d{1,2})[/\-.](\d{2,4})\b").expect("static pattern");
    static ref AGE_PATTERN: Regex =
        Regex::new(r"(?i)\bage\W{0,2}(\d{1,3})\b|\((\d{1,3})\s*(?:y/?o|yrs?|years?)\)")
            .expect("static pattern");
}

/// Renders page regions to grayscale rasters on demand.
///
/// The pipeline adapts the page renderer to this; tests use closures.
pub trait RegionRender {
    /// Render the whole page (`None`) or a sub-region, at `scale` pixels
    /// per page unit.
    fn render(&mut self, region: Option<Rect>, scale: f32) -> Result<GrayImage>;
}

impl<F> RegionRender for F
where
    F: FnMut(Option<Rect>, f32) -> Result<GrayImage>,
{
    fn render(&mut self, region: Option<Rect>, scale: f32) -> Result<GrayImage> {
        self(region, scale)
    }
}

/// Result of orchestrated recognition for one page.
#[derive(Debug, Clone, Default)]
pub struct OcrPageOutput {
    /// Final recognized lines in reading order, in page coordinates.
    pub lines: Vec<OcrLine>,
    /// Concatenated text of the final lines.
    pub text: String,
    /// Quality metrics of the final result.
    pub metrics: PassMetrics,
    /// Recognition passes run (attempts included).
    pub passes: usize,
    /// Recognition passes that failed after their retry.
    pub failed_passes: usize,
    /// Whether the figure-suppression safety fallback fired.
    pub suppression_disabled: bool,
    /// Junk score removed by suppression (raw minus final).
    pub junk_delta: f32,
}

impl OcrPageOutput {
    /// Whether any recognition succeeded.
    pub fn has_content(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

/// Drives recognition passes against one page.
pub struct Orchestrator<'a> {
    engine: &'a mut dyn RecognitionEngine,
    config: &'a ExtractionConfig,
    page_index: usize,
    cancel: CancelToken,
}

impl<'a> Orchestrator<'a> {
    /// Create an orchestrator for one page.
    pub fn new(
        engine: &'a mut dyn RecognitionEngine,
        config: &'a ExtractionConfig,
        page_index: usize,
        cancel: CancelToken,
    ) -> Self {
        Self {
            engine,
            config,
            page_index,
            cancel,
        }
    }

    /// Full-page mode: header pattern attempts per column, one body pass,
    /// figure suppression with a safety fallback.
    pub fn recognize_full_page(
        &mut self,
        render: &mut dyn RegionRender,
        page: &Rect,
        crop: Option<Rect>,
        masks: &MaskPlan,
        header: &HeaderPlan,
    ) -> Result<OcrPageOutput> {
        let mut output = OcrPageOutput::default();
        let base_scale = self.config.quality.scale();

        let mut lines: Vec<OcrLine> = Vec::new();
        for (zone_order, column) in header.columns.iter().enumerate() {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled(self.cancel.job()));
            }
            match self.recognize_header_column(render, column, zone_order, &mut output) {
                Some(mut column_lines) => lines.append(&mut column_lines),
                None => log::warn!(
                    "page {}: header column {} produced nothing",
                    self.page_index,
                    zone_order
                ),
            }
        }

        let body = body_region(page, crop.as_ref(), header);
        let mut body_lines = if let Some(body) = body {
            self.recognize_body(render, &body, base_scale, &masks.masks, &mut output)
        } else {
            Vec::new()
        };
        lines.append(&mut body_lines);
        sort_reading_order(&mut lines);

        // Figure suppression, with the safety fallback when it erases a
        // substantial result.
        let raw_metrics = PassMetrics::measure(&lines, self.config.short_low_confidence_threshold);
        let kept = suppress_figure_lines(&lines, &masks.masks, self.config.figure_overlap_threshold);
        let raw_chars = char_count(&lines);
        let kept_chars = char_count(&kept);

        let final_lines = if raw_chars >= SUPPRESSION_SUBSTANTIAL_CHARS
            && kept_chars < SUPPRESSION_ERASED_CHARS
        {
            log::warn!(
                "page {}: suppression erased {} -> {} chars, disabling figure suppression",
                self.page_index,
                raw_chars,
                kept_chars
            );
            output.suppression_disabled = true;
            if let Some(body) = body {
                // Re-run the body without masks so text under figures can
                // come back.
                let mut retry =
                    self.recognize_body(render, &body, base_scale, &[], &mut output);
                let mut merged: Vec<OcrLine> = lines
                    .iter()
                    .filter(|l| l.zone_id.is_some())
                    .cloned()
                    .collect();
                merged.append(&mut retry);
                sort_reading_order(&mut merged);
                merged
            } else {
                lines
            }
        } else {
            kept
        };

        output.metrics =
            PassMetrics::measure(&final_lines, self.config.short_low_confidence_threshold);
        output.junk_delta = raw_metrics.junk_score - output.metrics.junk_score;
        output.text = lines_to_text(&final_lines);
        output.lines = final_lines;
        Ok(output)
    }

    fn recognize_header_column(
        &mut self,
        render: &mut dyn RegionRender,
        column: &Rect,
        zone_order: usize,
        output: &mut OcrPageOutput,
    ) -> Option<Vec<OcrLine>> {
        let base_scale = self.config.quality.scale();
        let boost = self.config.header.scale_boost;
        let modes = self.config.header.retry_modes.clone();
        let steps = modes.len().max(1) as f32;

        let mut best: Option<(f32, Vec<OcrLine>)> = None;
        for (i, mode) in modes.iter().enumerate() {
            // Increasing scale across attempts, up to base * boost.
            let scale = base_scale * (1.0 + (boost - 1.0) * i as f32 / (steps - 1.0).max(1.0));
            output.passes += 1;

            let image = match render.render(Some(*column), scale) {
                Ok(img) => img,
                Err(e) => {
                    log::warn!("page {}: header render failed: {e}", self.page_index);
                    output.failed_passes += 1;
                    continue;
                }
            };

            let raw = match self.recognize_with_retry(&image, *mode) {
                Ok(lines) => lines,
                Err(Error::Cancelled(_)) => break,
                Err(e) => {
                    log::warn!("page {}: header attempt failed: {e}", self.page_index);
                    output.failed_passes += 1;
                    continue;
                }
            };

            let mut attempt: Vec<OcrLine> = raw
                .into_iter()
                .map(|l| to_page_coords(l, column, scale))
                .map(|mut l| {
                    l.zone_id = Some(zone_order);
                    l.zone_order = Some(zone_order);
                    l
                })
                .collect();
            sort_reading_order(&mut attempt);

            let metrics =
                PassMetrics::measure(&attempt, self.config.short_low_confidence_threshold);
            let text = lines_to_text(&attempt);
            let (dob_valid, age_valid) = header_validity(&text);
            let score = SCORE_DOB_VALID * dob_valid as u8 as f32
                + SCORE_AGE_VALID * age_valid as u8 as f32
                + metrics.mean_line_confidence / 100.0
                + (metrics.char_count as f32 / HEADER_CHAR_CEILING).min(HEADER_CHAR_CAP);

            log::debug!(
                "page {}: header col {} attempt {} ({:?}) score {:.2}",
                self.page_index,
                zone_order,
                i,
                mode,
                score
            );

            let better = best.as_ref().map_or(true, |(s, _)| score > *s);
            if better {
                best = Some((score, attempt));
            }
            if dob_valid && score >= HEADER_EARLY_EXIT_SCORE {
                break;
            }
        }

        best.map(|(_, lines)| lines)
    }

    fn recognize_body(
        &mut self,
        render: &mut dyn RegionRender,
        body: &Rect,
        scale: f32,
        masks: &[Rect],
        output: &mut OcrPageOutput,
    ) -> Vec<OcrLine> {
        output.passes += 1;
        let mut image = match render.render(Some(*body), scale) {
            Ok(img) => img,
            Err(e) => {
                log::warn!("page {}: body render failed: {e}", self.page_index);
                output.failed_passes += 1;
                return Vec::new();
            }
        };
        apply_masks(&mut image, masks, body, scale);

        match self.recognize_with_retry(&image, self.config.page_seg_mode) {
            Ok(lines) => lines
                .into_iter()
                .map(|l| to_page_coords(l, body, scale))
                .collect(),
            Err(e) => {
                log::warn!("page {}: body pass failed: {e}", self.page_index);
                output.failed_passes += 1;
                Vec::new()
            }
        }
    }

    /// Backfill mode: recognize each line band independently and
    /// concatenate results top-to-bottom.
    pub fn recognize_backfill(
        &mut self,
        render: &mut dyn RegionRender,
        bands: &[Rect],
    ) -> Result<OcrPageOutput> {
        let mut output = OcrPageOutput::default();
        let scale = self.config.quality.scale() * self.config.backfill.scale_boost;
        let binarization = if self.config.backfill.dilate {
            Binarization::OtsuDilated {
                bias: self.config.backfill.threshold_bias,
            }
        } else {
            Binarization::Otsu {
                bias: self.config.backfill.threshold_bias,
            }
        };

        let mut lines: Vec<OcrLine> = Vec::new();
        for band in bands {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled(self.cancel.job()));
            }
            output.passes += 1;
            let image = match render.render(Some(*band), scale) {
                Ok(img) => img,
                Err(e) => {
                    log::warn!("page {}: band render failed: {e}", self.page_index);
                    output.failed_passes += 1;
                    continue;
                }
            };
            let prepared = preprocess(&image, binarization);

            match self.recognize_with_retry(&prepared, PageSegMode::SingleBlock) {
                Ok(band_lines) => {
                    lines.extend(band_lines.into_iter().map(|l| to_page_coords(l, band, scale)));
                }
                Err(e) => {
                    log::warn!("page {}: band pass failed: {e}", self.page_index);
                    output.failed_passes += 1;
                }
            }
        }

        sort_reading_order(&mut lines);
        output.metrics = PassMetrics::measure(&lines, self.config.short_low_confidence_threshold);
        output.text = lines_to_text(&lines);
        output.lines = lines;
        Ok(output)
    }

    /// Quality-driven retry ladder for a standalone raster (camera frame or
    /// pre-rendered page).
    ///
    /// Runs a primary pass; when its metrics are weak, runs fallback passes
    /// varying segmentation and binarization, and keeps the globally
    /// highest-scoring pass.
    pub fn recognize_with_ladder(&mut self, image: &GrayImage) -> Result<OcrPageOutput> {
        let mut output = OcrPageOutput::default();
        let threshold = self.config.short_low_confidence_threshold;
        let bias = self.config.backfill.threshold_bias;

        let primary = self.run_ladder_pass(image, self.config.page_seg_mode, Binarization::None, &mut output)?;
        let primary_metrics = PassMetrics::measure(&primary, threshold);
        let mut best = (pass_score(&primary_metrics), primary, primary_metrics);

        if best.2.is_weak() {
            let fallbacks = [
                (PageSegMode::SingleBlock, Binarization::Otsu { bias }),
                (PageSegMode::SingleColumn, Binarization::Otsu { bias }),
                (PageSegMode::SparseText, Binarization::OtsuDilated { bias }),
            ];
            for (mode, binarization) in fallbacks.into_iter().take(MAX_LADDER_FALLBACKS) {
                let lines = match self.run_ladder_pass(image, mode, binarization, &mut output) {
                    Ok(lines) => lines,
                    Err(e @ Error::Cancelled(_)) => return Err(e),
                    Err(e) => {
                        log::warn!("page {}: ladder pass failed: {e}", self.page_index);
                        output.failed_passes += 1;
                        continue;
                    }
                };
                let metrics = PassMetrics::measure(&lines, threshold);
                let score = pass_score(&metrics);
                log::debug!(
                    "page {}: ladder {:?} score {:.3} (best {:.3})",
                    self.page_index,
                    mode,
                    score,
                    best.0
                );
                if score > best.0 {
                    best = (score, lines, metrics);
                }
            }
        }

        let (_, mut lines, metrics) = best;
        sort_reading_order(&mut lines);
        output.metrics = metrics;
        output.text = lines_to_text(&lines);
        output.lines = lines;
        Ok(output)
    }

    fn run_ladder_pass(
        &mut self,
        image: &GrayImage,
        mode: PageSegMode,
        binarization: Binarization,
        output: &mut OcrPageOutput,
    ) -> Result<Vec<OcrLine>> {
        output.passes += 1;
        let prepared = preprocess(image, binarization);
        self.recognize_with_retry(&prepared, mode)
    }

    /// Run one recognition pass, retrying once with a PNG-encoded buffer
    /// when the raw-buffer pass fails.
    fn recognize_with_retry(
        &mut self,
        image: &GrayImage,
        mode: PageSegMode,
    ) -> Result<Vec<OcrLine>> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled(self.cancel.job()));
        }
        match self.engine.recognize(image, mode) {
            Ok(lines) => Ok(lines),
            Err(first) => {
                log::warn!(
                    "page {}: pass failed ({first}), retrying with encoded buffer",
                    self.page_index
                );
                let mut png = Vec::new();
                image
                    .write_to(
                        &mut std::io::Cursor::new(&mut png),
                        image::ImageFormat::Png,
                    )
                    .map_err(|e| Error::Image(format!("retry encode failed: {e}")))?;
                self.engine
                    .recognize_encoded(&png, mode)
                    .map_err(|second| Error::Recognition {
                        page: self.page_index,
                        reason: format!("pass failed after retry: {second}"),
                    })
            }
        }
    }
}

/// Map a recognized line from region-image coordinates to page coordinates.
fn to_page_coords(mut line: OcrLine, region: &Rect, scale: f32) -> OcrLine {
    let map = |b: &Rect| {
        Rect::new(
            region.x + b.x / scale,
            region.y + b.y / scale,
            b.width / scale,
            b.height / scale,
        )
    };
    line.bbox = map(&line.bbox);
    for word in &mut line.words {
        word.bbox = map(&word.bbox);
    }
    line
}

/// The region of the page below the header zone, clipped to the crop.
fn body_region(page: &Rect, crop: Option<&Rect>, header: &HeaderPlan) -> Option<Rect> {
    let outer = crop.copied().unwrap_or(*page);
    let top = header.zone.bottom().max(outer.top());
    if top >= outer.bottom() {
        return None;
    }
    Some(Rect::from_points(
        outer.left(),
        top,
        outer.right(),
        outer.bottom(),
    ))
}

/// Paint mask rectangles white on a rendered region.
fn apply_masks(image: &mut GrayImage, masks: &[Rect], region: &Rect, scale: f32) {
    for mask in masks {
        let x0 = (((mask.left() - region.left()) * scale).max(0.0)) as u32;
        let y0 = (((mask.top() - region.top()) * scale).max(0.0)) as u32;
        let x1 = ((((mask.right() - region.left()) * scale).max(0.0)) as u32).min(image.width());
        let y1 = ((((mask.bottom() - region.top()) * scale).max(0.0)) as u32).min(image.height());
        for y in y0..y1 {
            for x in x0..x1 {
                image.put_pixel(x, y, image::Luma([255]));
            }
        }
    }
}

/// Drop OCR lines that mostly sit on masked figure regions.
fn suppress_figure_lines(lines: &[OcrLine], masks: &[Rect], threshold: f32) -> Vec<OcrLine> {
    if masks.is_empty() {
        return lines.to_vec();
    }
    lines
        .iter()
        .filter(|line| {
            let area = line.bbox.area();
            if area <= 0.0 {
                return true;
            }
            let covered: f32 = masks.iter().map(|m| intersection_area(&line.bbox, m)).sum();
            covered / area < threshold
        })
        .cloned()
        .collect()
}

fn char_count(lines: &[OcrLine]) -> usize {
    lines
        .iter()
        .map(|l| l.text.chars().filter(|c| !c.is_whitespace()).count())
        .sum()
}

/// Validate header fields in recognized text: a plausible date of birth and
/// a plausible age.
fn header_validity(text: &str) -> (bool, bool) {
    let current_year = chrono::Utc::now().year();

    let dob_valid = DATE_PATTERN.captures_iter(text).any(|c| {
        let month: u32 = c[1].parse().unwrap_or(0);
        let day: u32 = c[2].parse().unwrap_or(0);
        let mut year: i32 = c[3].parse().unwrap_or(0);
        if year < 100 {
            year += if year + 2000 > current_year { 1900 } else { 2000 };
        }
        (1900..=current_year).contains(&year)
            && chrono::NaiveDate::from_ymd_opt(year, month, day).is_some()
    });

    let age_valid = AGE_PATTERN.captures_iter(text).any(|c| {
        let digits = c.get(1).or_else(|| c.get(2)).map(|m| m.as_str()).unwrap_or("");
        digits.parse::<u32>().map(|age| age < 120).unwrap_or(false)
    });

    (dob_valid, age_valid)
}
