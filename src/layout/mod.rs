//! Layout analysis: clustering positioned text items into lines, segments,
//! and blocks, and deriving candidate text regions.
//!
//! The analyzer is purely geometric. It consumes the positioned glyph runs
//! supplied by the rendering collaborator and produces a reading-order
//! structure that the assembler, classifier, and OCR planner build on.

pub mod blocks;
pub mod item;
pub mod lines;

pub use blocks::{build_blocks, Block};
pub use item::{ImageRegion, ImageRegionSource, TextItem};
pub use lines::{build_lines, Line, Segment};

use crate::geometry::Rect;

/// Full geometric layout of one page.
#[derive(Debug, Clone)]
pub struct PageLayout {
    /// Lines in top-to-bottom order, each split into segments.
    pub lines: Vec<Line>,
    /// Blocks in reading order.
    pub blocks: Vec<Block>,
}

impl PageLayout {
    /// Analyze a page's positioned items.
    pub fn analyze(items: &[TextItem]) -> Self {
        let lines = build_lines(items);
        let blocks = build_blocks(&lines);
        Self { lines, blocks }
    }

    /// Candidate text regions for contamination scoring: one rect per segment.
    pub fn text_regions(&self) -> Vec<Rect> {
        self.lines
            .iter()
            .flat_map(|l| l.segments.iter().map(|s| s.bbox))
            .collect()
    }

    /// Bounding boxes of all lines, top-to-bottom. Used for line-band planning.
    pub fn line_boxes(&self) -> Vec<Rect> {
        self.lines.iter().map(|l| l.bbox).collect()
    }
}
