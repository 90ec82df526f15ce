//! Layout analysis integration tests: items through lines, segments,
//! blocks, and assembled text.

use text_triage::assembler::{assemble, AssembleOptions};
use text_triage::contamination::{self, DEFAULT_EXPAND_MARGIN, DEFAULT_MIN_OVERLAP_RATIO};
use text_triage::geometry::{intersection_area, merge_regions, Rect};
use text_triage::layout::{ImageRegion, ImageRegionSource, PageLayout, TextItem};

const PAGE: Rect = Rect {
    x: 0.0,
    y: 0.0,
    width: 612.0,
    height: 792.0,
};

fn item(index: usize, text: &str, x: f32, y: f32, w: f32) -> TextItem {
    TextItem::new(index, text, Rect::new(x, y, w, 12.0))
}

#[test]
fn test_two_column_page_layout() {
    // Left column and right column, three lines each.
    let mut items = Vec::new();
    for i in 0..3 {
        items.push(item(i * 2, "Left column line text", 40.0, 100.0 + i as f32 * 16.0, 200.0));
        items.push(item(
            i * 2 + 1,
            "Right column line text",
            360.0,
            100.0 + i as f32 * 16.0,
            200.0,
        ));
    }
    let layout = PageLayout::analyze(&items);

    // Items pair up on three lines, two segments per line (column gap).
    assert_eq!(layout.lines.len(), 3);
    for line in &layout.lines {
        assert_eq!(line.segments.len(), 2);
    }

    // Columns form separate blocks.
    assert_eq!(layout.blocks.len(), 2);
    assert!(layout.blocks[0].bbox.x < layout.blocks[1].bbox.x);
    assert_eq!(layout.blocks[0].text().lines().count(), 3);
}

#[test]
fn test_text_regions_cover_segments() {
    let items = vec![
        item(0, "Alpha", 0.0, 0.0, 50.0),
        item(1, "Beta", 300.0, 0.0, 40.0),
    ];
    let layout = PageLayout::analyze(&items);
    let regions = layout.text_regions();
    assert_eq!(regions.len(), 2);
}

#[test]
fn test_overlap_ratio_bounds() {
    let texts = vec![Rect::new(0.0, 0.0, 100.0, 20.0), Rect::new(0.0, 50.0, 80.0, 20.0)];

    // No images: exactly zero.
    assert_eq!(contamination::overlap_ratio(&texts, &[]), 0.0);

    // Oversized image: clamped to one.
    let huge = vec![Rect::new(-100.0, -100.0, 1000.0, 1000.0)];
    assert_eq!(contamination::overlap_ratio(&texts, &huge), 1.0);

    // Partial overlap stays inside the unit interval.
    let partial = vec![Rect::new(0.0, 0.0, 50.0, 20.0)];
    let r = contamination::overlap_ratio(&texts, &partial);
    assert!(r > 0.0 && r < 1.0);
}

#[test]
fn test_merge_regions_coverage_and_separation() {
    let rects = vec![
        Rect::new(0.0, 0.0, 40.0, 20.0),
        Rect::new(42.0, 0.0, 40.0, 20.0),
        Rect::new(200.0, 200.0, 30.0, 30.0),
        Rect::new(-10.0, 5.0, 20.0, 10.0),
    ];
    let merged = merge_regions(&rects, 3.0);

    // Coverage: every input is inside some output.
    for r in &rects {
        let r = r.normalize();
        assert!(merged.iter().any(|m| intersection_area(m, &r) >= r.area() - 1e-3));
    }

    // Separation: outputs are farther than the gap on at least one axis.
    for i in 0..merged.len() {
        for j in (i + 1)..merged.len() {
            let a = &merged[i];
            let b = &merged[j];
            let gx = (b.left() - a.right()).max(a.left() - b.right()).max(0.0);
            let gy = (b.top() - a.bottom()).max(a.top() - b.bottom()).max(0.0);
            assert!(gx > 3.0 || gy > 3.0);
        }
    }
}

#[test]
fn test_assembled_label_value_page() {
    let items = vec![
        item(0, "Patient:", 40.0, 60.0, 70.0),
        item(1, "DOB:", 320.0, 60.0, 40.0),
        item(2, "Jane Doe", 40.0, 78.0, 75.0),
        item(3, "01/02/1980", 320.0, 78.0, 85.0),
        item(4, "The chief complaint was recorded at intake.", 40.0, 140.0, 400.0),
    ];
    let layout = PageLayout::analyze(&items);
    let contamination = contamination::detect(
        &items,
        &[],
        &PAGE,
        DEFAULT_EXPAND_MARGIN,
        DEFAULT_MIN_OVERLAP_RATIO,
    );
    let out = assemble(&layout, &contamination, AssembleOptions::default());

    assert!(out.text.contains("Patient: Jane Doe"));
    assert!(out.text.contains("DOB: 01/02/1980"));
    assert!(out.text.contains("chief complaint"));
    assert_eq!(out.excluded_token_ratio, 0.0);
}

#[test]
fn test_contaminated_watermark_filtered_from_text() {
    let items = vec![
        item(0, "Real paragraph content on the page.", 40.0, 60.0, 350.0),
        item(1, "§", 300.0, 400.0, 10.0),
        item(2, "42", 360.0, 400.0, 16.0),
    ];
    let images = vec![ImageRegion::new(
        Rect::new(280.0, 380.0, 120.0, 60.0),
        ImageRegionSource::Heuristic,
    )];
    let layout = PageLayout::analyze(&items);
    let contamination = contamination::detect(
        &items,
        &images,
        &PAGE,
        DEFAULT_EXPAND_MARGIN,
        DEFAULT_MIN_OVERLAP_RATIO,
    );
    assert!(contamination.is_contaminated(1));
    assert!(contamination.is_contaminated(2));

    let out = assemble(&layout, &contamination, AssembleOptions::default());
    assert!(out.text.contains("Real paragraph content"));
    assert!(!out.text.contains('§'));
    assert!(out.excluded_token_ratio > 0.0);

    // The raw string keeps everything.
    assert!(out.raw_text.contains('§'));
}
