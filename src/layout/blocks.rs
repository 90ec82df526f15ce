//! Greedy grouping of segments into spatially affiliated blocks.

use crate::geometry::Rect;
use crate::layout::lines::{Line, Segment};
use crate::utils::safe_float_cmp;

/// A segment never attaches across a vertical gap larger than this.
const MAX_BLOCK_VERTICAL_GAP: f32 = 14.0;

/// Minimum horizontal overlap ratio for attachment without center proximity.
const MIN_HORIZONTAL_OVERLAP: f32 = 0.15;

/// Center-distance fallback for attachment when overlap is insufficient.
const MAX_CENTER_DISTANCE: f32 = 38.0;

/// Weight of the missing-overlap term in the attachment cost.
const OVERLAP_COST_WEIGHT: f32 = 4.0;

/// Weight of the center-distance term in the attachment cost.
const CENTER_COST_WEIGHT: f32 = 0.02;

/// Vertical tolerance for treating two blocks as the same band when ordering.
const ORDER_TIE_TOLERANCE: f32 = 8.0;

/// An ordered set of segments spatially affiliated into one block.
#[derive(Debug, Clone)]
pub struct Block {
    /// Bounding box of all member segments.
    pub bbox: Rect,
    /// Member segments in reading order.
    pub segments: Vec<Segment>,
}

impl Block {
    fn new(seg: Segment) -> Self {
        Self {
            bbox: seg.bbox,
            segments: vec![seg],
        }
    }

    fn push(&mut self, seg: Segment) {
        self.bbox = self.bbox.union(&seg.bbox);
        self.segments.push(seg);
    }

    /// Assembled multi-line text: segments sharing a baseline joined on one
    /// row, rows joined top-to-bottom.
    pub fn text(&self) -> String {
        let mut rows: Vec<(f32, Vec<&Segment>)> = Vec::new();
        for seg in &self.segments {
            match rows
                .iter_mut()
                .find(|(y, _)| (*y - seg.baseline_y).abs() < 0.5)
            {
                Some((_, row)) => row.push(seg),
                None => rows.push((seg.baseline_y, vec![seg])),
            }
        }
        rows.sort_by(|a, b| safe_float_cmp(a.0, b.0));
        rows.iter()
            .map(|(_, row)| {
                let mut row = row.clone();
                row.sort_by(|a, b| safe_float_cmp(a.bbox.x, b.bbox.x));
                row.iter().map(|s| s.text.as_str()).collect::<Vec<_>>().join("  ")
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Vertical gap between a segment and a block, zero when they overlap.
fn vertical_gap(seg: &Rect, block: &Rect) -> f32 {
    (seg.top() - block.bottom())
        .max(block.top() - seg.bottom())
        .max(0.0)
}

/// Horizontal overlap length over the narrower of the two widths.
fn horizontal_overlap_ratio(seg: &Rect, block: &Rect) -> f32 {
    let overlap = seg.right().min(block.right()) - seg.left().max(block.left());
    let narrower = seg.width.min(block.width);
    if overlap <= 0.0 || narrower <= 0.0 {
        0.0
    } else {
        (overlap / narrower).min(1.0)
    }
}

/// Attachment cost of a segment to a block; `None` when the constraints
/// forbid attachment.
fn attachment_cost(seg: &Rect, block: &Rect) -> Option<f32> {
    let v_gap = vertical_gap(seg, block);
    if v_gap > MAX_BLOCK_VERTICAL_GAP {
        return None;
    }
    let overlap = horizontal_overlap_ratio(seg, block);
    let center_dx = (seg.center().x - block.center().x).abs();
    if overlap < MIN_HORIZONTAL_OVERLAP && center_dx > MAX_CENTER_DISTANCE {
        return None;
    }
    Some(v_gap + (1.0 - overlap) * OVERLAP_COST_WEIGHT + CENTER_COST_WEIGHT * center_dx)
}

/// Group segments into blocks by greedy nearest-block attachment.
///
/// Lines are consumed top-to-bottom and segments left-to-right; each
/// segment attaches to the existing block with the lowest attachment
/// cost, or starts a new block when no block satisfies the constraints.
/// Final block order is top-to-bottom with a left-to-right tie-break.
pub fn build_blocks(lines: &[Line]) -> Vec<Block> {
    let mut blocks: Vec<Block> = Vec::new();

    for line in lines {
        for seg in &line.segments {
            let best = blocks
                .iter_mut()
                .filter_map(|b| attachment_cost(&seg.bbox, &b.bbox).map(|c| (c, b)))
                .min_by(|(ca, _), (cb, _)| safe_float_cmp(*ca, *cb));

            match best {
                Some((_, block)) => block.push(seg.clone()),
                None => blocks.push(Block::new(seg.clone())),
            }
        }
    }

    blocks.sort_by(|a, b| {
        if (a.bbox.y - b.bbox.y).abs() <= ORDER_TIE_TOLERANCE {
            safe_float_cmp(a.bbox.x, b.bbox.x)
        } else {
            safe_float_cmp(a.bbox.y, b.bbox.y)
        }
    });
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::build_lines;
    use crate::layout::item::TextItem;

    fn item(index: usize, text: &str, x: f32, y: f32, w: f32) -> TextItem {
        TextItem::new(index, text, Rect::new(x, y, w, 12.0))
    }

    fn layout(items: Vec<TextItem>) -> Vec<Block> {
        build_blocks(&build_lines(&items))
    }

    #[test]
    fn test_stacked_lines_form_one_block() {
        let blocks = layout(vec![
            item(0, "First line of text", 0.0, 0.0, 150.0),
            item(1, "Second line of text", 0.0, 16.0, 150.0),
            item(2, "Third line of text", 0.0, 32.0, 150.0),
        ]);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].segments.len(), 3);
    }

    #[test]
    fn test_distant_paragraphs_split_blocks() {
        let blocks = layout(vec![
            item(0, "Paragraph one", 0.0, 0.0, 120.0),
            item(1, "Paragraph two", 0.0, 60.0, 120.0), // gap 48 > 14
        ]);
        assert_eq!(blocks.len(), 2);
    }

    #[test]
    fn test_side_columns_split_blocks() {
        // No horizontal overlap and centers 300 units apart
        let blocks = layout(vec![
            item(0, "Left column text", 0.0, 0.0, 120.0),
            item(1, "Right column text", 300.0, 16.0, 120.0),
        ]);
        assert_eq!(blocks.len(), 2);
    }

    #[test]
    fn test_block_order_top_to_bottom_then_left() {
        let blocks = layout(vec![
            item(0, "Bottom block text here", 0.0, 200.0, 150.0),
            item(1, "Right top block words", 300.0, 2.0, 150.0),
            item(2, "Left top block words", 0.0, 0.0, 150.0),
        ]);
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[0].segments[0].text, "Left top block words");
        assert_eq!(blocks[1].segments[0].text, "Right top block words");
        assert_eq!(blocks[2].segments[0].text, "Bottom block text here");
    }

    #[test]
    fn test_block_text_rows() {
        let blocks = layout(vec![
            item(0, "Alpha row", 0.0, 0.0, 90.0),
            item(1, "Beta row", 0.0, 16.0, 90.0),
        ]);
        assert_eq!(blocks[0].text(), "Alpha row\nBeta row");
    }

    #[test]
    fn test_attachment_cost_constraints() {
        let block = Rect::new(0.0, 0.0, 100.0, 20.0);
        // Directly below, fully overlapping: attachable
        assert!(attachment_cost(&Rect::new(0.0, 24.0, 100.0, 12.0), &block).is_some());
        // Too far below
        assert!(attachment_cost(&Rect::new(0.0, 60.0, 100.0, 12.0), &block).is_none());
        // No overlap, far center
        assert!(attachment_cost(&Rect::new(400.0, 24.0, 20.0, 12.0), &block).is_none());

        // No overlap but center within the fallback distance
        let narrow = Rect::new(0.0, 0.0, 40.0, 20.0);
        assert!(attachment_cost(&Rect::new(42.0, 24.0, 30.0, 12.0), &narrow).is_some());
    }
}
