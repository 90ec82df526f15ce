//! Baseline clustering of items into lines and gap-splitting into segments.

use crate::geometry::Rect;
use crate::layout::item::TextItem;
use crate::utils::safe_float_cmp;

/// Floor for the adaptive baseline tolerance, in page units.
const MIN_BASELINE_TOLERANCE: f32 = 2.0;

/// Tolerance contribution from the item's own glyph height.
const OWN_HEIGHT_FACTOR: f32 = 0.55;

/// Tolerance contribution from the running median glyph height.
const MEDIAN_HEIGHT_FACTOR: f32 = 0.5;

/// Hard cap on the baseline tolerance.
const MAX_BASELINE_TOLERANCE: f32 = 10.0;

/// Minimum horizontal gap that always starts a new segment.
const MIN_SEGMENT_GAP: f32 = 14.0;

/// Segment gap threshold as a multiple of the average character width.
const SEGMENT_GAP_CHAR_FACTOR: f32 = 2.5;

/// Fraction of a character width above which a gap reads as a space.
const SPACE_GAP_CHAR_FACTOR: f32 = 0.33;

/// A gap-delimited run of items inside a line.
#[derive(Debug, Clone)]
pub struct Segment {
    /// Items in left-to-right order.
    pub items: Vec<TextItem>,
    /// Bounding box of the segment.
    pub bbox: Rect,
    /// Assembled text with inferred inter-token spacing.
    pub text: String,
    /// Baseline of the owning line.
    pub baseline_y: f32,
}

impl Segment {
    fn from_items(items: Vec<TextItem>, baseline_y: f32, avg_char_width: f32) -> Self {
        let bbox = items
            .iter()
            .skip(1)
            .fold(items[0].bbox, |acc, it| acc.union(&it.bbox));

        let mut text = String::new();
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                let prev = &items[i - 1];
                let gap = item.bbox.left() - prev.bbox.right();
                let mut char_w = (prev.char_width() + item.char_width()) / 2.0;
                if char_w <= 0.0 {
                    char_w = avg_char_width;
                }
                if char_w > 0.0 && gap > char_w * SPACE_GAP_CHAR_FACTOR {
                    text.push(' ');
                }
            }
            text.push_str(&item.text);
        }

        Self {
            items,
            bbox,
            text,
            baseline_y,
        }
    }
}

/// An ordered set of items sharing a baseline within the adaptive tolerance.
#[derive(Debug, Clone)]
pub struct Line {
    /// Running-average baseline y of member items.
    pub baseline_y: f32,
    /// Running-average glyph height of member items.
    pub avg_height: f32,
    /// Bounding box of all member items.
    pub bbox: Rect,
    /// Gap-split segments, left to right.
    pub segments: Vec<Segment>,
}

impl Line {
    /// Assembled text of the whole line, segments joined by double space.
    pub fn text(&self) -> String {
        self.segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join("  ")
    }
}

struct LineAccum {
    items: Vec<TextItem>,
    baseline_sum: f32,
    height_sum: f32,
}

impl LineAccum {
    fn new(item: TextItem) -> Self {
        let baseline = item.baseline();
        let height = item.bbox.height;
        Self {
            items: vec![item],
            baseline_sum: baseline,
            height_sum: height,
        }
    }

    fn baseline(&self) -> f32 {
        self.baseline_sum / self.items.len() as f32
    }

    fn avg_height(&self) -> f32 {
        self.height_sum / self.items.len() as f32
    }

    fn push(&mut self, item: TextItem) {
        self.baseline_sum += item.baseline();
        self.height_sum += item.bbox.height;
        self.items.push(item);
    }
}

/// Dynamic baseline tolerance for one item given the running median height.
fn baseline_tolerance(item_height: f32, median_height: f32) -> f32 {
    MIN_BASELINE_TOLERANCE
        .max(item_height * OWN_HEIGHT_FACTOR)
        .max(median_height * MEDIAN_HEIGHT_FACTOR)
        .min(MAX_BASELINE_TOLERANCE)
}

/// Cluster items into lines by baseline proximity.
///
/// Each item attaches to the nearest existing line whose running-average
/// baseline is within the adaptive tolerance; otherwise it starts a new
/// line. The tolerance grows with the item's own glyph height and the
/// running median height, capped at [`MAX_BASELINE_TOLERANCE`].
pub fn build_lines(items: &[TextItem]) -> Vec<Line> {
    let mut accums: Vec<LineAccum> = Vec::new();
    let mut heights: Vec<f32> = Vec::new();

    for item in items {
        if item.text.is_empty() {
            continue;
        }

        let median = running_median(&heights);
        let tolerance = baseline_tolerance(item.bbox.height, median);
        let baseline = item.baseline();

        let nearest = accums
            .iter_mut()
            .min_by(|a, b| {
                safe_float_cmp((a.baseline() - baseline).abs(), (b.baseline() - baseline).abs())
            })
            .filter(|line| (line.baseline() - baseline).abs() < tolerance);

        match nearest {
            Some(line) => line.push(item.clone()),
            None => accums.push(LineAccum::new(item.clone())),
        }

        let pos = heights
            .binary_search_by(|h| safe_float_cmp(*h, item.bbox.height))
            .unwrap_or_else(|p| p);
        heights.insert(pos, item.bbox.height);
    }

    let mut lines: Vec<Line> = accums.into_iter().map(finish_line).collect();
    lines.sort_by(|a, b| safe_float_cmp(a.baseline_y, b.baseline_y));
    lines
}

fn running_median(sorted_heights: &[f32]) -> f32 {
    if sorted_heights.is_empty() {
        return 0.0;
    }
    let n = sorted_heights.len();
    if n % 2 == 1 {
        sorted_heights[n / 2]
    } else {
        (sorted_heights[n / 2 - 1] + sorted_heights[n / 2]) / 2.0
    }
}

fn finish_line(accum: LineAccum) -> Line {
    let baseline_y = accum.baseline();
    let avg_height = accum.avg_height();

    let mut items = accum.items;
    items.sort_by(|a, b| safe_float_cmp(a.bbox.x, b.bbox.x));

    let bbox = items
        .iter()
        .skip(1)
        .fold(items[0].bbox, |acc, it| acc.union(&it.bbox));

    let avg_char_width = line_char_width(&items);
    let gap_threshold = MIN_SEGMENT_GAP.max(avg_char_width * SEGMENT_GAP_CHAR_FACTOR);

    let mut segments = Vec::new();
    let mut run: Vec<TextItem> = Vec::new();
    for item in items {
        if let Some(prev) = run.last() {
            let gap = item.bbox.left() - prev.bbox.right();
            if gap > gap_threshold {
                segments.push(Segment::from_items(
                    std::mem::take(&mut run),
                    baseline_y,
                    avg_char_width,
                ));
            }
        }
        run.push(item);
    }
    if !run.is_empty() {
        segments.push(Segment::from_items(run, baseline_y, avg_char_width));
    }

    Line {
        baseline_y,
        avg_height,
        bbox,
        segments,
    }
}

/// Width per character averaged over a line's items.
fn line_char_width(items: &[TextItem]) -> f32 {
    let chars: usize = items.iter().map(|i| i.text.chars().count()).sum();
    if chars == 0 {
        return 0.0;
    }
    let width: f32 = items
        .iter()
        .filter(|i| !i.text.is_empty())
        .map(|i| i.bbox.width)
        .sum();
    width / chars as f32
}
