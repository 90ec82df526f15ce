//! Per-page statistics and the scoring helpers built on them.

use crate::assembler::AssembledText;
use crate::contamination::ContaminationResult;
use crate::geometry::Rect;
use crate::layout::{ImageRegion, TextItem};

/// Aggregate statistics for one page, computed once and consumed by the
/// classifier, the planner, and the fusion engine.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct PageStats {
    /// Characters of assembled native text.
    pub char_count: usize,
    /// Positioned items on the page.
    pub item_count: usize,
    /// Image placement operators observed.
    pub image_op_count: usize,
    /// Fraction of text area covered by images, `[0, 1]`.
    pub overlap_ratio: f32,
    /// Weighted contamination score, `[0, 1]`.
    pub contamination_score: f32,
    /// Estimated probability that the native layer is complete, `[0, 1]`.
    pub completeness_confidence: f32,
    /// Characters per square page unit.
    pub native_text_density: f32,
    /// Page area in square units.
    pub page_area: f32,
    /// Fraction of items holding a single character.
    pub single_char_item_ratio: f32,
    /// Fraction of non-printable characters in the native text.
    pub non_printable_ratio: f32,
    /// Fraction of alphabetic characters among non-space characters.
    pub alpha_ratio: f32,
    /// Median token length of the native text.
    pub median_token_len: f32,
    /// Fraction of tokens dropped by the contamination filter.
    pub excluded_token_ratio: f32,
}

// score_contamination weights. Empirically tuned; kept verbatim.
const W_OVERLAP: f32 = 0.55;
const W_CONTAMINATED: f32 = 0.2;
const W_SHORT_CONTAMINATED: f32 = 0.15;
const W_EXCLUDED: f32 = 0.1;

// Completeness penalties. Empirically tuned; kept verbatim.
const SPARSE_CHAR_COUNT: usize = 80;
const SPARSE_PENALTY: f32 = 0.35;
const SINGLE_CHAR_RATIO: f32 = 0.55;
const SINGLE_CHAR_PENALTY: f32 = 0.17;
const NON_PRINTABLE_RATIO: f32 = 0.08;
const NON_PRINTABLE_PENALTY: f32 = 0.12;
const IMAGE_HEAVY_SEVERE_PENALTY: f32 = 0.2;
const IMAGE_HEAVY_MODERATE_PENALTY: f32 = 0.12;
const OVERLAP_PENALTY_SCALE: f32 = 0.45;
const OVERLAP_PENALTY_CAP: f32 = 0.32;
const CONTAMINATION_PENALTY_SCALE: f32 = 0.4;
const CONTAMINATION_PENALTY_CAP: f32 = 0.28;
const EXCLUDED_PENALTY_SCALE: f32 = 0.3;
const EXCLUDED_PENALTY_CAP: f32 = 0.2;

/// Weighted contamination score over the detector's ratios, `[0, 1]`.
pub fn score_contamination(
    overlap_ratio: f32,
    contaminated_ratio: f32,
    short_contaminated_ratio: f32,
    excluded_token_ratio: f32,
) -> f32 {
    (W_OVERLAP * overlap_ratio
        + W_CONTAMINATED * contaminated_ratio
        + W_SHORT_CONTAMINATED * short_contaminated_ratio
        + W_EXCLUDED * excluded_token_ratio)
        .clamp(0.0, 1.0)
}

/// Estimate how likely the native text layer is complete.
///
/// Starts at 1.0 and subtracts penalties for sparse text, glyph-soup item
/// shapes, non-printable noise, image-heavy pages with little text, and the
/// contamination family of ratios.
#[allow(clippy::too_many_arguments)]
pub fn estimate_completeness_confidence(
    char_count: usize,
    single_char_item_ratio: f32,
    non_printable_ratio: f32,
    image_op_count: usize,
    overlap_ratio: f32,
    contamination_score: f32,
    excluded_token_ratio: f32,
) -> f32 {
    let mut confidence = 1.0f32;

    if char_count < SPARSE_CHAR_COUNT {
        confidence -= SPARSE_PENALTY;
    }
    if single_char_item_ratio >= SINGLE_CHAR_RATIO {
        confidence -= SINGLE_CHAR_PENALTY;
    }
    if non_printable_ratio >= NON_PRINTABLE_RATIO {
        confidence -= NON_PRINTABLE_PENALTY;
    }

    if image_op_count >= 2 && char_count < 120 {
        confidence -= IMAGE_HEAVY_SEVERE_PENALTY;
    } else if image_op_count >= 1 && char_count < 300 {
        confidence -= IMAGE_HEAVY_MODERATE_PENALTY;
    }

    confidence -= (overlap_ratio * OVERLAP_PENALTY_SCALE).min(OVERLAP_PENALTY_CAP);
    confidence -= (contamination_score * CONTAMINATION_PENALTY_SCALE).min(CONTAMINATION_PENALTY_CAP);
    confidence -= (excluded_token_ratio * EXCLUDED_PENALTY_SCALE).min(EXCLUDED_PENALTY_CAP);

    confidence.clamp(0.0, 1.0)
}

impl PageStats {
    /// Compute page statistics from the layout artifacts.
    pub fn compute(
        items: &[TextItem],
        image_regions: &[ImageRegion],
        page: &Rect,
        text_regions: &[Rect],
        contamination: &ContaminationResult,
        assembled: &AssembledText,
    ) -> Self {
        let text = &assembled.text;
        let char_count = text.chars().filter(|c| !c.is_whitespace()).count();
        let item_count = items.len();

        let single_char_items = items
            .iter()
            .filter(|i| i.text.trim().chars().count() == 1)
            .count();
        let single_char_item_ratio = single_char_items as f32 / item_count.max(1) as f32;

        let total_chars = text.chars().filter(|c| !c.is_whitespace()).count().max(1);
        let non_printable = text.chars().filter(|c| c.is_control() && *c != '\n').count()
            + text.chars().filter(|c| *c == char::REPLACEMENT_CHARACTER).count();
        let non_printable_ratio = non_printable as f32 / total_chars as f32;

        let alpha = text.chars().filter(|c| c.is_alphabetic()).count();
        let alpha_ratio = alpha as f32 / total_chars as f32;

        let mut token_lens: Vec<usize> = text
            .split_whitespace()
            .map(|t| t.chars().count())
            .collect();
        token_lens.sort_unstable();
        let median_token_len = if token_lens.is_empty() {
            0.0
        } else if token_lens.len() % 2 == 1 {
            token_lens[token_lens.len() / 2] as f32
        } else {
            (token_lens[token_lens.len() / 2 - 1] + token_lens[token_lens.len() / 2]) as f32 / 2.0
        };

        let page_area = page.normalize().area().max(1.0);
        let image_rects: Vec<Rect> = image_regions.iter().map(|r| r.bbox).collect();
        let overlap = crate::contamination::overlap_ratio(text_regions, &image_rects);

        let contamination_score = score_contamination(
            overlap,
            contamination.contaminated_ratio,
            contamination.short_symbolic_ratio,
            assembled.excluded_token_ratio,
        );

        let completeness_confidence = estimate_completeness_confidence(
            char_count,
            single_char_item_ratio,
            non_printable_ratio,
            image_regions.len(),
            overlap,
            contamination_score,
            assembled.excluded_token_ratio,
        );

        Self {
            char_count,
            item_count,
            image_op_count: image_regions.len(),
            overlap_ratio: overlap,
            contamination_score,
            completeness_confidence,
            native_text_density: char_count as f32 / page_area,
            page_area,
            single_char_item_ratio,
            non_printable_ratio,
            alpha_ratio,
            median_token_len,
            excluded_token_ratio: assembled.excluded_token_ratio,
        }
    }
}
