//! The page-rendering collaborator contract.
//!
//! The rendering layer owns document parsing, glyph positioning, and
//! rasterization. The pipeline consumes it through this trait and never
//! touches document bytes itself.

use image::{DynamicImage, GrayImage};

use crate::error::Result;
use crate::geometry::Rect;
use crate::layout::{ImageRegion, TextItem};

/// Extracted content of one page.
#[derive(Debug, Clone, Default)]
pub struct PageContent {
    /// Positioned text items with stable indices.
    pub items: Vec<TextItem>,
    /// Image placement rectangles.
    pub image_regions: Vec<ImageRegion>,
    /// Page bounds in page units.
    pub bounds: Rect,
}

/// Supplies page content and rasters for one document.
///
/// Implementations wrap the actual renderer (a PDF engine, an image stack).
/// All methods take `&mut self`: renderers commonly hold caches or native
/// handles.
pub trait PageRenderer {
    /// Number of pages in the document.
    fn page_count(&self) -> usize;

    /// Positioned items, image regions, and bounds for a page.
    fn page_content(&mut self, page: usize) -> Result<PageContent>;

    /// Render the full page at `scale` pixels per page unit.
    fn render_page(&mut self, page: usize, scale: f32) -> Result<DynamicImage>;

    /// Render a sub-region at `scale` pixels per page unit.
    fn render_region(&mut self, page: usize, region: Rect, scale: f32) -> Result<GrayImage>;
}
