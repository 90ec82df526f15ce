//! Input item types supplied by the rendering collaborator.

use crate::geometry::Rect;

/// A positioned glyph run extracted from the page's content stream.
///
/// Items are immutable once extracted; `index` is stable for the lifetime
/// of the page and is how contamination results refer back to items.
#[derive(Debug, Clone, PartialEq)]
pub struct TextItem {
    /// Stable index assigned by the extractor.
    pub index: usize,
    /// The run's text.
    pub text: String,
    /// Baseline box of the run.
    pub bbox: Rect,
}

impl TextItem {
    /// Create an item, normalizing the box so layout heuristics never see
    /// negative extents or NaN coordinates from imperfect upstream data.
    pub fn new(index: usize, text: impl Into<String>, bbox: Rect) -> Self {
        Self {
            index,
            text: text.into(),
            bbox: bbox.normalize(),
        }
    }

    /// Baseline y-coordinate: the bottom edge of the glyph box.
    pub fn baseline(&self) -> f32 {
        self.bbox.bottom()
    }

    /// Average advance width per character of this run.
    pub fn char_width(&self) -> f32 {
        let n = self.text.chars().count();
        if n == 0 {
            0.0
        } else {
            self.bbox.width / n as f32
        }
    }
}

/// Where an image placement rectangle came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ImageRegionSource {
    /// Derived from a rendering operator (XObject / inline image placement).
    Operator,
    /// Detected heuristically from the raster.
    Heuristic,
}

/// An image placement on the page, used for contamination scoring and
/// OCR mask planning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageRegion {
    /// Page-relative placement rectangle.
    pub bbox: Rect,
    /// How the region was obtained.
    pub source: ImageRegionSource,
}

impl ImageRegion {
    /// Create a region with a normalized placement rect.
    pub fn new(bbox: Rect, source: ImageRegionSource) -> Self {
        Self {
            bbox: bbox.normalize(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_normalizes_box() {
        let item = TextItem::new(0, "hi", Rect::new(10.0, 10.0, -6.0, 4.0));
        assert_eq!(item.bbox.x, 4.0);
        assert_eq!(item.bbox.width, 6.0);
    }

    #[test]
    fn test_baseline_is_bottom_edge() {
        let item = TextItem::new(0, "hi", Rect::new(0.0, 10.0, 20.0, 8.0));
        assert_eq!(item.baseline(), 18.0);
    }

    #[test]
    fn test_char_width() {
        let item = TextItem::new(0, "abcd", Rect::new(0.0, 0.0, 40.0, 10.0));
        assert_eq!(item.char_width(), 10.0);

        let empty = TextItem::new(1, "", Rect::new(0.0, 0.0, 40.0, 10.0));
        assert_eq!(empty.char_width(), 0.0);
    }
}
