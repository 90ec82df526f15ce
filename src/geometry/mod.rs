//! Geometric primitives for layout analysis.
//!
//! This module provides the rectangle kernel used throughout layout
//! analysis, contamination scoring, and OCR region planning.

/// A 2D point in page space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    /// X coordinate
    pub x: f32,
    /// Y coordinate
    pub y: f32,
}

impl Point {
    /// Create a new point.
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// A rectangle in page space.
///
/// Coordinates follow the renderer convention: origin at the top-left,
/// y increasing downward. Rectangles arriving from collaborators may have
/// negative extents; [`Rect::normalize`] maps them to canonical form.
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Rect {
    /// X coordinate of top-left corner
    pub x: f32,
    /// Y coordinate of top-left corner
    pub y: f32,
    /// Width of rectangle
    pub width: f32,
    /// Height of rectangle
    pub height: f32,
}

impl Rect {
    /// Create a new rectangle from position and dimensions.
    ///
    /// # Examples
    ///
    /// ```
    /// use text_triage::geometry::Rect;
    ///
    /// let rect = Rect::new(0.0, 0.0, 100.0, 50.0);
    /// assert_eq!(rect.width, 100.0);
    /// assert_eq!(rect.height, 50.0);
    /// ```
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Create a rectangle from two corner points.
    pub fn from_points(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
        }
    }

    /// Map an arbitrary rectangle to canonical non-negative form.
    ///
    /// Negative widths/heights are folded back onto the origin corner, and
    /// non-finite coordinates are coerced to zero so downstream heuristics
    /// never see NaN. Idempotent.
    ///
    /// # Examples
    ///
    /// ```
    /// use text_triage::geometry::Rect;
    ///
    /// let r = Rect::new(10.0, 10.0, -4.0, 6.0).normalize();
    /// assert_eq!(r.x, 6.0);
    /// assert_eq!(r.width, 4.0);
    /// assert!(r.area() >= 0.0);
    /// ```
    pub fn normalize(&self) -> Rect {
        let sanitize = |v: f32| if v.is_finite() { v } else { 0.0 };
        let x = sanitize(self.x);
        let y = sanitize(self.y);
        let w = sanitize(self.width);
        let h = sanitize(self.height);

        let (x, w) = if w < 0.0 { (x + w, -w) } else { (x, w) };
        let (y, h) = if h < 0.0 { (y + h, -h) } else { (y, h) };
        Rect::new(x, y, w, h)
    }

    /// Get the left edge x-coordinate.
    pub fn left(&self) -> f32 {
        self.x
    }

    /// Get the right edge x-coordinate.
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    /// Get the top edge y-coordinate.
    pub fn top(&self) -> f32 {
        self.y
    }

    /// Get the bottom edge y-coordinate.
    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Get the center point of the rectangle.
    pub fn center(&self) -> Point {
        Point {
            x: self.x + self.width / 2.0,
            y: self.y + self.height / 2.0,
        }
    }

    /// Compute the area of the rectangle.
    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    /// Check if this rectangle intersects with another.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.left() < other.right()
            && self.right() > other.left()
            && self.top() < other.bottom()
            && self.bottom() > other.top()
    }

    /// Compute the union of this rectangle with another.
    ///
    /// Returns the smallest rectangle that contains both rectangles.
    pub fn union(&self, other: &Rect) -> Rect {
        let x0 = self.left().min(other.left());
        let y0 = self.top().min(other.top());
        let x1 = self.right().max(other.right());
        let y1 = self.bottom().max(other.bottom());
        Rect::from_points(x0, y0, x1, y1)
    }

    /// Grow the rectangle by `margin` on every side.
    ///
    /// When `bounds` is given the result is clipped to it.
    pub fn expand(&self, margin: f32, bounds: Option<&Rect>) -> Rect {
        let mut r = Rect::new(
            self.x - margin,
            self.y - margin,
            self.width + margin * 2.0,
            self.height + margin * 2.0,
        )
        .normalize();
        if let Some(b) = bounds {
            let x0 = r.left().max(b.left());
            let y0 = r.top().max(b.top());
            let x1 = r.right().min(b.right());
            let y1 = r.bottom().min(b.bottom());
            r = Rect::from_points(x0, y0, x1.max(x0), y1.max(y0));
        }
        r
    }

    /// Gap between this rectangle and another, per axis.
    ///
    /// Zero when the projections touch or overlap on that axis.
    fn axis_gaps(&self, other: &Rect) -> (f32, f32) {
        let gx = (other.left() - self.right()).max(self.left() - other.right()).max(0.0);
        let gy = (other.top() - self.bottom()).max(self.top() - other.bottom()).max(0.0);
        (gx, gy)
    }
}

/// Area of the intersection of two rectangles.
///
/// Returns 0.0 when the rectangles are disjoint. Inputs are normalized
/// first so negative-extent rectangles behave.
///
/// # Examples
///
/// ```
/// use text_triage::geometry::{intersection_area, Rect};
///
/// let a = Rect::new(0.0, 0.0, 10.0, 10.0);
/// let b = Rect::new(5.0, 5.0, 10.0, 10.0);
/// assert_eq!(intersection_area(&a, &b), 25.0);
///
/// let c = Rect::new(100.0, 100.0, 5.0, 5.0);
/// assert_eq!(intersection_area(&a, &c), 0.0);
/// ```
pub fn intersection_area(a: &Rect, b: &Rect) -> f32 {
    let a = a.normalize();
    let b = b.normalize();
    let w = a.right().min(b.right()) - a.left().max(b.left());
    let h = a.bottom().min(b.bottom()) - a.top().max(b.top());
    if w <= 0.0 || h <= 0.0 {
        0.0
    } else {
        w * h
    }
}

/// Merge a region set so that no two output rectangles are separated by
/// less than `gap`.
///
/// Rectangles are sorted by (y, x) and greedily unioned into accumulated
/// groups: a rectangle joins the first group it touches or overlaps within
/// `gap` pixels on both axes, otherwise it starts a new group. The sweep
/// repeats until stable, since a union can bridge two previously separate
/// groups.
///
/// Coverage is never lost: every input rectangle lies inside some output
/// rectangle, so total merged area >= total input union area.
pub fn merge_regions(rects: &[Rect], gap: f32) -> Vec<Rect> {
    let mut current: Vec<Rect> = rects
        .iter()
        .map(|r| r.normalize())
        .filter(|r| r.width > 0.0 && r.height > 0.0)
        .collect();

    loop {
        current.sort_by(|a, b| {
            crate::utils::safe_float_cmp(a.y, b.y).then(crate::utils::safe_float_cmp(a.x, b.x))
        });

        let mut merged: Vec<Rect> = Vec::with_capacity(current.len());
        let mut changed = false;

        for rect in &current {
            let mut placed = false;
            for group in merged.iter_mut() {
                let (gx, gy) = group.axis_gaps(rect);
                if gx <= gap && gy <= gap {
                    *group = group.union(rect);
                    placed = true;
                    changed = true;
                    break;
                }
            }
            if !placed {
                merged.push(*rect);
            }
        }

        if !changed {
            return merged;
        }
        current = merged;
    }
}
