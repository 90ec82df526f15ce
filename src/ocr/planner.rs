//! OCR region planning: crop, mask, header-zone, and line-band regions.
//!
//! Recognition cost scales with pixels; the planner bounds it by trimming
//! low-information margins, masking photo-like imagery that would produce
//! garbage text, and scoping backfill passes to narrow line bands.

use image::DynamicImage;

use crate::config::{CropMode, ExtractionConfig, MaskMode};
use crate::geometry::{merge_regions, Rect};
use crate::layout::ImageRegion;
use crate::utils::safe_float_cmp;

/// Minimum margin trim for an auto crop to be worth a sub-canvas.
const CROP_MIN_TRIM: f32 = 24.0;

/// Edge length of the low-resolution sample grid for mask classification.
const MASK_SAMPLE_EDGE: u32 = 32;

/// White-pixel luma floor.
const WHITE_LUMA: u8 = 230;

/// Dark-pixel luma ceiling.
const DARK_LUMA: u8 = 40;

/// A region at least this white reads as a text-bearing scan.
const TEXT_LIKE_WHITE_RATIO: f32 = 0.55;

/// Mean channel spread above which a region reads as a photo.
const TEXT_LIKE_MAX_COLORFULNESS: f32 = 18.0;

/// Dark-pixel ceiling for a text-like region.
const TEXT_LIKE_MAX_DARK_RATIO: f32 = 0.3;

/// A region covering this much of the page is the page, not a figure.
const FULL_PAGE_COVERAGE: f32 = 0.97;

/// Coverage for the scanned-page masking exception.
const SCANNED_PAGE_COVERAGE: f32 = 0.92;

/// Native character count under which a page counts as text-sparse for the
/// scanned-page exception.
const SCANNED_PAGE_MAX_CHARS: usize = 80;

/// Minimum header column gap, in page units.
const MIN_HEADER_GAP: f32 = 24.0;

/// Minimum header column width as a fraction of page width.
const MIN_HEADER_COLUMN_FRACTION: f32 = 0.18;

/// Header-zone plan: the zone itself plus its column split.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderPlan {
    /// The full header band at the top of the page.
    pub zone: Rect,
    /// Left and right column regions, in recognition order.
    pub columns: Vec<Rect>,
    /// Whether the split came from a located gap (true) or the midline
    /// fallback (false).
    pub gap_split: bool,
}

/// Mask plan for a full-page pass.
#[derive(Debug, Clone, Default)]
pub struct MaskPlan {
    /// Regions to paint out before recognition.
    pub masks: Vec<Rect>,
    /// Why masking was skipped wholesale, when it was.
    pub skipped: Option<String>,
}

/// Plans crop, mask, header, and band regions from page geometry.
pub struct RegionPlanner<'a> {
    config: &'a ExtractionConfig,
}

impl<'a> RegionPlanner<'a> {
    /// Create a planner over the pipeline configuration.
    pub fn new(config: &'a ExtractionConfig) -> Self {
        Self { config }
    }

    /// Compute the crop rectangle for a full-page pass.
    ///
    /// Returns `None` when recognition should use the whole page.
    pub fn plan_crop(&self, text_regions: &[Rect], image_regions: &[ImageRegion], page: &Rect) -> Option<Rect> {
        if self.config.crop.mode == CropMode::Off {
            return None;
        }

        let mut content: Option<Rect> = None;
        for r in text_regions.iter().copied().chain(image_regions.iter().map(|i| i.bbox)) {
            content = Some(match content {
                Some(acc) => acc.union(&r),
                None => r,
            });
        }
        let content = content?;
        let cropped = content.expand(self.config.crop.padding, Some(page));

        if self.config.crop.mode == CropMode::Auto {
            let trim_x = page.width - cropped.width;
            let trim_y = page.height - cropped.height;
            if trim_x < CROP_MIN_TRIM && trim_y < CROP_MIN_TRIM {
                return None;
            }
        }
        Some(cropped)
    }

    /// Classify image regions into photo-like masks.
    ///
    /// `raster` is sampled at low resolution per region; regions that look
    /// like text-bearing scans are left unmasked. Two exceptions skip
    /// masking: a region that *is* the page, and a scanned page (sparse
    /// native text under one near-full-page image).
    pub fn plan_masks(
        &self,
        image_regions: &[ImageRegion],
        page: &Rect,
        raster: &DynamicImage,
        native_char_count: usize,
    ) -> MaskPlan {
        if self.config.mask.mode == MaskMode::Off || image_regions.is_empty() {
            return MaskPlan::default();
        }

        let page_area = page.normalize().area().max(1.0);
        let near_full = |r: &Rect| r.area() / page_area >= SCANNED_PAGE_COVERAGE;

        if native_char_count < SCANNED_PAGE_MAX_CHARS
            && image_regions.iter().any(|r| near_full(&r.bbox))
        {
            return MaskPlan {
                masks: Vec::new(),
                skipped: Some("scanned page: near-full-page image with sparse native text".to_string()),
            };
        }

        let mut masks: Vec<Rect> = Vec::new();
        for region in image_regions {
            let coverage = region.bbox.area() / page_area;
            if coverage >= FULL_PAGE_COVERAGE {
                continue;
            }
            let force = self.config.mask.mode == MaskMode::On;
            if force || self.looks_photo_like(&region.bbox, page, raster) {
                masks.push(region.bbox.expand(self.config.mask.margin, Some(page)));
            }
        }

        let mut masks = merge_regions(&masks, self.config.mask.margin);
        if masks.len() > self.config.mask.max_regions {
            // Keep the largest offenders.
            masks.sort_by(|a, b| safe_float_cmp(b.area(), a.area()));
            masks.truncate(self.config.mask.max_regions);
        }

        MaskPlan {
            masks,
            skipped: None,
        }
    }

    fn looks_photo_like(&self, region: &Rect, page: &Rect, raster: &DynamicImage) -> bool {
        let sample = match sample_region(region, page, raster) {
            Some(s) => s,
            None => return false,
        };
        log::debug!(
            "mask sample: white={:.2} dark={:.2} colorfulness={:.1}",
            sample.white_ratio,
            sample.dark_ratio,
            sample.colorfulness
        );
        !(sample.white_ratio >= TEXT_LIKE_WHITE_RATIO
            && sample.colorfulness <= TEXT_LIKE_MAX_COLORFULNESS
            && sample.dark_ratio <= TEXT_LIKE_MAX_DARK_RATIO)
    }

    /// Plan the header zone and its column split.
    ///
    /// The split point is the widest horizontal gap between header-zone
    /// text rectangles, when a gap of at least [`MIN_HEADER_GAP`] exists
    /// and both columns keep a workable width; otherwise the zone is split
    /// at the midline.
    pub fn plan_header(&self, text_regions: &[Rect], page: &Rect) -> HeaderPlan {
        let zone = Rect::new(page.x, page.y, page.width, page.height * self.config.header.fraction);

        let mut intervals: Vec<(f32, f32)> = text_regions
            .iter()
            .filter(|r| r.intersects(&zone))
            .map(|r| (r.left(), r.right()))
            .collect();
        intervals.sort_by(|a, b| safe_float_cmp(a.0, b.0));

        let merged = merge_intervals(&intervals);
        let min_column = page.width * MIN_HEADER_COLUMN_FRACTION;

        let mut best_gap: Option<(f32, f32)> = None;
        for pair in merged.windows(2) {
            let gap_start = pair[0].1;
            let gap_end = pair[1].0;
            let width = gap_end - gap_start;
            if width < MIN_HEADER_GAP {
                continue;
            }
            let left_width = gap_start - zone.left();
            let right_width = zone.right() - gap_end;
            if left_width < min_column || right_width < min_column {
                continue;
            }
            if best_gap.map_or(true, |(s, e)| width > e - s) {
                best_gap = Some((gap_start, gap_end));
            }
        }

        let (split, gap_split) = match best_gap {
            Some((s, e)) => ((s + e) / 2.0, true),
            None => (zone.left() + zone.width / 2.0, false),
        };

        let columns = vec![
            Rect::from_points(zone.left(), zone.top(), split, zone.bottom()),
            Rect::from_points(split, zone.top(), zone.right(), zone.bottom()),
        ];

        HeaderPlan {
            zone,
            columns,
            gap_split,
        }
    }

    /// Plan band regions for targeted backfill passes.
    ///
    /// `target_lines` are the bounding boxes of lines flagged as likely
    /// fragments. Bands are padded, merged where they touch, and capped at
    /// the configured maximum, keeping the topmost bands.
    pub fn plan_line_bands(&self, target_lines: &[Rect], page: &Rect) -> Vec<Rect> {
        let padding = self.config.backfill.band_padding;
        let padded: Vec<Rect> = target_lines
            .iter()
            .map(|r| r.expand(padding, Some(page)))
            .collect();
        let mut bands = merge_regions(&padded, padding);
        bands.sort_by(|a, b| safe_float_cmp(a.y, b.y));
        bands.truncate(self.config.backfill.max_bands);
        bands
    }
}

struct RegionSample {
    white_ratio: f32,
    dark_ratio: f32,
    colorfulness: f32,
}

/// Sample a page region from the raster at low resolution.
///
/// `raster` covers the full page; region coordinates are mapped through the
/// raster scale. Returns `None` for degenerate regions.
fn sample_region(region: &Rect, page: &Rect, raster: &DynamicImage) -> Option<RegionSample> {
    let page = page.normalize();
    if page.width <= 0.0 || page.height <= 0.0 {
        return None;
    }
    let sx = raster.width() as f32 / page.width;
    let sy = raster.height() as f32 / page.height;

    let r = region.normalize();
    let x = ((r.x - page.x) * sx).max(0.0) as u32;
    let y = ((r.y - page.y) * sy).max(0.0) as u32;
    let w = ((r.width * sx) as u32).min(raster.width().saturating_sub(x));
    let h = ((r.height * sy) as u32).min(raster.height().saturating_sub(y));
    if w == 0 || h == 0 {
        return None;
    }

    let crop = raster.crop_imm(x, y, w, h);
    let thumb = crop.thumbnail(MASK_SAMPLE_EDGE, MASK_SAMPLE_EDGE).to_rgb8();

    let mut white = 0usize;
    let mut dark = 0usize;
    let mut spread_sum = 0f32;
    let total = (thumb.width() * thumb.height()).max(1) as f32;

    for p in thumb.pixels() {
        let [r, g, b] = p.0;
        let luma = (0.299 * r as f32 + 0.587 * g as f32 + 0.114 * b as f32) as u8;
        if luma >= WHITE_LUMA {
            white += 1;
        }
        if luma <= DARK_LUMA {
            dark += 1;
        }
        let max = r.max(g).max(b) as f32;
        let min = r.min(g).min(b) as f32;
        spread_sum += max - min;
    }

    Some(RegionSample {
        white_ratio: white as f32 / total,
        dark_ratio: dark as f32 / total,
        colorfulness: spread_sum / total,
    })
}

fn merge_intervals(sorted: &[(f32, f32)]) -> Vec<(f32, f32)> {
    let mut merged: Vec<(f32, f32)> = Vec::new();
    for &(start, end) in sorted {
        match merged.last_mut() {
            Some((_, last_end)) if start <= *last_end => *last_end = last_end.max(end),
            _ => merged.push((start, end)),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExtractionConfig;
    use crate::layout::ImageRegionSource;
    use image::{Rgb, RgbImage};

    const PAGE: Rect = Rect {
        x: 0.0,
        y: 0.0,
        width: 600.0,
        height: 800.0,
    };

    fn white_page_raster() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(300, 400, Rgb([250, 250, 250])))
    }

    fn raster_with_photo(x: u32, y: u32, w: u32, h: u32) -> DynamicImage {
        let mut img = RgbImage::from_pixel(300, 400, Rgb([250, 250, 250]));
        for py in y..(y + h).min(400) {
            for px in x..(x + w).min(300) {
                // Saturated color patch
                img.put_pixel(px, py, Rgb([200, 40, 90]));
            }
        }
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn test_crop_auto_trims_margins() {
        let config = ExtractionConfig::default();
        let planner = RegionPlanner::new(&config);
        let texts = vec![Rect::new(50.0, 50.0, 300.0, 400.0)];
        let crop = planner.plan_crop(&texts, &[], &PAGE).unwrap();
        assert!(crop.width < PAGE.width);
        assert!(crop.left() <= 50.0);
        assert!(crop.right() >= 350.0);
    }

    #[test]
    fn test_crop_auto_skips_full_pages() {
        let config = ExtractionConfig::default();
        let planner = RegionPlanner::new(&config);
        let texts = vec![Rect::new(2.0, 2.0, 596.0, 796.0)];
        assert!(planner.plan_crop(&texts, &[], &PAGE).is_none());
    }

    #[test]
    fn test_crop_off() {
        let mut config = ExtractionConfig::default();
        config.crop.mode = CropMode::Off;
        let planner = RegionPlanner::new(&config);
        let texts = vec![Rect::new(50.0, 50.0, 100.0, 100.0)];
        assert!(planner.plan_crop(&texts, &[], &PAGE).is_none());
    }

    #[test]
    fn test_mask_photo_region() {
        let config = ExtractionConfig::default();
        let planner = RegionPlanner::new(&config);
        // Photo occupies page units (200..400, 200..400) -> raster (100..200, 100..200)
        let raster = raster_with_photo(100, 100, 100, 100);
        let regions = vec![ImageRegion::new(
            Rect::new(200.0, 200.0, 200.0, 200.0),
            ImageRegionSource::Operator,
        )];
        let plan = planner.plan_masks(&regions, &PAGE, &raster, 1500);
        assert_eq!(plan.masks.len(), 1);
        assert!(plan.skipped.is_none());
    }

    #[test]
    fn test_text_like_region_unmasked() {
        let config = ExtractionConfig::default();
        let planner = RegionPlanner::new(&config);
        let raster = white_page_raster();
        let regions = vec![ImageRegion::new(
            Rect::new(200.0, 200.0, 200.0, 200.0),
            ImageRegionSource::Operator,
        )];
        let plan = planner.plan_masks(&regions, &PAGE, &raster, 1500);
        assert!(plan.masks.is_empty());
    }

    #[test]
    fn test_scanned_page_exception() {
        let config = ExtractionConfig::default();
        let planner = RegionPlanner::new(&config);
        let raster = raster_with_photo(0, 0, 300, 400);
        let regions = vec![ImageRegion::new(
            Rect::new(0.0, 0.0, 590.0, 790.0), // ~97% coverage
            ImageRegionSource::Operator,
        )];
        let plan = planner.plan_masks(&regions, &PAGE, &raster, 20);
        assert!(plan.masks.is_empty());
        assert!(plan.skipped.is_some());
    }

    #[test]
    fn test_full_page_image_never_masked() {
        let config = ExtractionConfig::default();
        let planner = RegionPlanner::new(&config);
        let raster = raster_with_photo(0, 0, 300, 400);
        let regions = vec![ImageRegion::new(
            Rect::new(0.0, 0.0, 600.0, 800.0),
            ImageRegionSource::Operator,
        )];
        // Plenty of native text: scanned-page exception does not apply,
        // but the full-page region is still left alone.
        let plan = planner.plan_masks(&regions, &PAGE, &raster, 1500);
        assert!(plan.masks.is_empty());
        assert!(plan.skipped.is_none());
    }

    #[test]
    fn test_header_gap_split() {
        let config = ExtractionConfig::default();
        let planner = RegionPlanner::new(&config);
        // Two clusters in the header zone with a wide central gap
        let texts = vec![
            Rect::new(20.0, 10.0, 180.0, 14.0),
            Rect::new(20.0, 30.0, 160.0, 14.0),
            Rect::new(380.0, 10.0, 180.0, 14.0),
            Rect::new(380.0, 30.0, 150.0, 14.0),
        ];
        let plan = planner.plan_header(&texts, &PAGE);
        assert!(plan.gap_split);
        assert_eq!(plan.columns.len(), 2);
        let split = plan.columns[0].right();
        assert!(split > 200.0 && split < 380.0);
    }

    #[test]
    fn test_header_midline_fallback() {
        let config = ExtractionConfig::default();
        let planner = RegionPlanner::new(&config);
        // One continuous run of text: no usable gap
        let texts = vec![Rect::new(20.0, 10.0, 560.0, 14.0)];
        let plan = planner.plan_header(&texts, &PAGE);
        assert!(!plan.gap_split);
        assert_eq!(plan.columns[0].right(), 300.0);
    }

    #[test]
    fn test_header_zone_fraction() {
        let config = ExtractionConfig::default();
        let planner = RegionPlanner::new(&config);
        let plan = planner.plan_header(&[], &PAGE);
        assert_eq!(plan.zone.height, PAGE.height * config.header.fraction);
    }

    #[test]
    fn test_line_bands_merged_and_capped() {
        let mut config = ExtractionConfig::default();
        config.backfill.max_bands = 2;
        let planner = RegionPlanner::new(&config);
        let lines = vec![
            Rect::new(0.0, 100.0, 500.0, 12.0),
            Rect::new(0.0, 114.0, 500.0, 12.0), // touches after padding
            Rect::new(0.0, 300.0, 500.0, 12.0),
            Rect::new(0.0, 500.0, 500.0, 12.0),
        ];
        let bands = planner.plan_line_bands(&lines, &PAGE);
        assert_eq!(bands.len(), 2);
        assert!(bands[0].y < bands[1].y);
    }
}
