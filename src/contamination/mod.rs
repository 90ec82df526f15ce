//! Contamination scoring: overlap between text and image regions.
//!
//! Text that sits on top of embedded imagery is frequently garbage (watermark
//! echoes, diagram labels, half-rendered captions). The detector quantifies
//! how much of the page's text is at risk so the classifier and assembler can
//! react.

use std::collections::BTreeSet;

use crate::geometry::{intersection_area, merge_regions, Rect};
use crate::layout::{ImageRegion, TextItem};

/// Default margin by which image regions are expanded before scoring.
pub const DEFAULT_EXPAND_MARGIN: f32 = 3.0;

/// Default minimum overlap fraction for an item to count as contaminated.
pub const DEFAULT_MIN_OVERLAP_RATIO: f32 = 0.12;

/// Tokens at or below this length are "short" for artifact detection.
const SHORT_TOKEN_LEN: usize = 3;

/// Result of contamination analysis for one page.
#[derive(Debug, Clone, Default)]
pub struct ContaminationResult {
    /// Indices of contaminated items (stable item indices).
    pub contaminated_items: BTreeSet<usize>,
    /// Fraction of items that are contaminated.
    pub contaminated_ratio: f32,
    /// Fraction of items that are short, non-alphabetic, and contaminated
    /// (watermark / diagram-label artifacts).
    pub short_symbolic_ratio: f32,
    /// The expanded, merged image regions the scores were computed against.
    pub expanded_regions: Vec<Rect>,
}

impl ContaminationResult {
    /// Whether a given item index was flagged.
    pub fn is_contaminated(&self, index: usize) -> bool {
        self.contaminated_items.contains(&index)
    }
}

/// Ratio of text area covered by image regions, in `[0, 1]`.
///
/// Per text region the covered area is capped at the region's own area, so
/// stacked images cannot push the ratio past 1. Returns 0.0 when there are
/// no image regions.
pub fn overlap_ratio(text_regions: &[Rect], image_regions: &[Rect]) -> f32 {
    if image_regions.is_empty() {
        return 0.0;
    }

    let mut text_area = 0.0f32;
    let mut covered = 0.0f32;
    for text in text_regions {
        let t = text.normalize();
        if t.area() <= 0.0 {
            continue;
        }
        text_area += t.area();
        let overlap: f32 = image_regions.iter().map(|img| intersection_area(&t, img)).sum();
        covered += overlap.min(t.area());
    }

    if text_area <= 0.0 {
        0.0
    } else {
        (covered / text_area).clamp(0.0, 1.0)
    }
}

/// Expand image regions by `margin` (clipped to the page) and merge them.
pub fn expand_image_regions(regions: &[ImageRegion], page: &Rect, margin: f32) -> Vec<Rect> {
    let expanded: Vec<Rect> = regions
        .iter()
        .map(|r| r.bbox.expand(margin, Some(page)))
        .collect();
    merge_regions(&expanded, margin)
}

/// Score per-item contamination against expanded image regions.
///
/// An item is contaminated when the covered fraction of its own box reaches
/// `min_overlap_ratio`.
pub fn detect(
    items: &[TextItem],
    image_regions: &[ImageRegion],
    page: &Rect,
    margin: f32,
    min_overlap_ratio: f32,
) -> ContaminationResult {
    let expanded = expand_image_regions(image_regions, page, margin);

    let mut contaminated = BTreeSet::new();
    let mut short_symbolic = 0usize;

    for item in items {
        let area = item.bbox.area();
        if area <= 0.0 {
            continue;
        }
        let covered: f32 = expanded.iter().map(|r| intersection_area(&item.bbox, r)).sum();
        if covered / area >= min_overlap_ratio {
            contaminated.insert(item.index);
            if is_short_symbolic(&item.text) {
                short_symbolic += 1;
            }
        }
    }

    let total = items.len().max(1) as f32;
    ContaminationResult {
        contaminated_ratio: contaminated.len() as f32 / total,
        short_symbolic_ratio: short_symbolic as f32 / total,
        contaminated_items: contaminated,
        expanded_regions: expanded,
    }
}

/// Short tokens with no alphabetic content read as artifacts, not words.
pub fn is_short_symbolic(text: &str) -> bool {
    let trimmed = text.trim();
    !trimmed.is_empty()
        && trimmed.chars().count() <= SHORT_TOKEN_LEN
        && !trimmed.chars().any(|c| c.is_alphabetic())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::ImageRegionSource;

    fn item(index: usize, text: &str, x: f32, y: f32, w: f32, h: f32) -> TextItem {
        TextItem::new(index, text, Rect::new(x, y, w, h))
    }

    fn image(x: f32, y: f32, w: f32, h: f32) -> ImageRegion {
        ImageRegion::new(Rect::new(x, y, w, h), ImageRegionSource::Operator)
    }

    const PAGE: Rect = Rect {
        x: 0.0,
        y: 0.0,
        width: 600.0,
        height: 800.0,
    };

    #[test]
    fn test_overlap_ratio_no_images() {
        let texts = vec![Rect::new(0.0, 0.0, 100.0, 20.0)];
        assert_eq!(overlap_ratio(&texts, &[]), 0.0);
    }

    #[test]
    fn test_overlap_ratio_half_covered() {
        let texts = vec![Rect::new(0.0, 0.0, 100.0, 20.0)];
        let images = vec![Rect::new(0.0, 0.0, 50.0, 20.0)];
        let ratio = overlap_ratio(&texts, &images);
        assert!((ratio - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_overlap_ratio_capped_per_region() {
        // Two stacked images over the same text must not exceed 1.0
        let texts = vec![Rect::new(0.0, 0.0, 100.0, 20.0)];
        let images = vec![
            Rect::new(0.0, 0.0, 100.0, 20.0),
            Rect::new(0.0, 0.0, 100.0, 20.0),
        ];
        assert_eq!(overlap_ratio(&texts, &images), 1.0);
    }

    #[test]
    fn test_overlap_ratio_in_unit_interval() {
        let texts = vec![
            Rect::new(0.0, 0.0, 100.0, 20.0),
            Rect::new(0.0, 40.0, 100.0, 20.0),
        ];
        let images = vec![Rect::new(-50.0, -50.0, 500.0, 500.0)];
        let r = overlap_ratio(&texts, &images);
        assert!((0.0..=1.0).contains(&r));
    }

    #[test]
    fn test_detect_flags_overlapping_item() {
        let items = vec![
            item(0, "clean", 0.0, 0.0, 50.0, 12.0),
            item(1, "dirty", 200.0, 200.0, 50.0, 12.0),
        ];
        let images = vec![image(190.0, 190.0, 100.0, 40.0)];
        let result = detect(&items, &images, &PAGE, DEFAULT_EXPAND_MARGIN, DEFAULT_MIN_OVERLAP_RATIO);
        assert!(!result.is_contaminated(0));
        assert!(result.is_contaminated(1));
        assert!((result.contaminated_ratio - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_detect_below_threshold_not_flagged() {
        // Image margin-expanded still covers under 12% of the item
        let items = vec![item(0, "mostly clean text", 0.0, 0.0, 200.0, 12.0)];
        let images = vec![image(0.0, 0.0, 10.0, 6.0)];
        let result = detect(&items, &images, &PAGE, 0.0, DEFAULT_MIN_OVERLAP_RATIO);
        assert!(!result.is_contaminated(0));
    }

    #[test]
    fn test_short_symbolic_ratio() {
        let items = vec![
            item(0, "§7", 10.0, 10.0, 12.0, 10.0),
            item(1, "legend", 10.0, 30.0, 60.0, 10.0),
        ];
        let images = vec![image(0.0, 0.0, 100.0, 50.0)];
        let result = detect(&items, &images, &PAGE, DEFAULT_EXPAND_MARGIN, DEFAULT_MIN_OVERLAP_RATIO);
        assert!(result.is_contaminated(0));
        assert!((result.short_symbolic_ratio - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_is_short_symbolic() {
        assert!(is_short_symbolic("§7"));
        assert!(is_short_symbolic("##"));
        assert!(is_short_symbolic("42"));
        assert!(!is_short_symbolic("ab"));
        assert!(!is_short_symbolic("word"));
        assert!(!is_short_symbolic("1234")); // too long
        assert!(!is_short_symbolic("  "));
    }

    #[test]
    fn test_expanded_regions_merged() {
        let images = vec![image(0.0, 0.0, 10.0, 10.0), image(12.0, 0.0, 10.0, 10.0)];
        let expanded = expand_image_regions(&images, &PAGE, 3.0);
        assert_eq!(expanded.len(), 1);
    }
}
