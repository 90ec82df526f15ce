//! Reading-order text assembly with contamination filtering and
//! label/value row pairing.

use crate::contamination::ContaminationResult;
use crate::layout::{PageLayout, Segment};
use crate::utils::safe_float_cmp;

/// Minimum adaptive row tolerance, in page units.
const MIN_ROW_TOLERANCE: f32 = 4.0;

/// Row tolerance as a fraction of the median segment height.
const ROW_TOLERANCE_HEIGHT_FACTOR: f32 = 0.6;

/// A contaminated token this short is dropped outright.
const DROP_SHORT_LEN: usize = 3;

/// Contaminated purely-numeric tokens up to this many digits are dropped.
const DROP_NUMERIC_LEN: usize = 4;

/// Maximum text length for a segment to read as a field label.
const LABEL_MAX_LEN: usize = 28;

/// Row label-segment fraction at or above which a row is label-like.
const LABEL_ROW_FRACTION: f32 = 0.6;

/// Next-row label fraction at or below which it reads as a value row.
const VALUE_ROW_FRACTION: f32 = 0.34;

/// Paragraph break multiplier over the typical row gap.
const PARAGRAPH_GAP_FACTOR: f32 = 1.8;

/// Why a retained span of output text is suspect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SpanKind {
    /// The text overlapped an embedded image region.
    ImageOverlap,
}

/// Character-offset span of retained-but-suspect text in the filtered output.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FlaggedSpan {
    /// Start offset (chars) into the filtered text.
    pub start: usize,
    /// End offset (chars, exclusive).
    pub end: usize,
    /// Why the span is flagged.
    pub kind: SpanKind,
}

/// Assembled page text.
#[derive(Debug, Clone, Default)]
pub struct AssembledText {
    /// Contamination-filtered text in reading order.
    pub text: String,
    /// Unfiltered text over the same rows.
    pub raw_text: String,
    /// Retained contaminated spans within `text`.
    pub flagged_spans: Vec<FlaggedSpan>,
    /// Fraction of segments dropped by the contamination filter.
    pub excluded_token_ratio: f32,
}

/// Options for assembly.
#[derive(Debug, Clone, Copy)]
pub struct AssembleOptions {
    /// When false, contaminated tokens are kept (and flagged) instead of
    /// dropped.
    pub filter_contaminated: bool,
}

impl Default for AssembleOptions {
    fn default() -> Self {
        Self {
            filter_contaminated: true,
        }
    }
}

struct RowToken<'a> {
    seg: &'a Segment,
    contaminated: bool,
}

struct Row<'a> {
    y: f32,
    tokens: Vec<RowToken<'a>>,
}

impl Row<'_> {
    fn label_fraction(&self) -> f32 {
        if self.tokens.is_empty() {
            return 0.0;
        }
        let labels = self.tokens.iter().filter(|t| is_label_like(&t.seg.text)).count();
        labels as f32 / self.tokens.len() as f32
    }
}

fn is_label_like(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.ends_with(':') && trimmed.chars().count() <= LABEL_MAX_LEN
}

/// Whether a contaminated token is a droppable artifact.
fn is_droppable(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return true;
    }
    let len = trimmed.chars().count();
    if len <= DROP_SHORT_LEN {
        return true;
    }
    if len <= DROP_NUMERIC_LEN && trimmed.chars().all(|c| c.is_ascii_digit()) {
        return true;
    }
    !trimmed.chars().any(|c| c.is_alphanumeric())
}

/// Assemble a page layout into reading-order text.
///
/// Segments are regrouped into rows with an adaptive y-tolerance derived
/// from the median segment height, contaminated artifacts are filtered,
/// label rows are zipped with their value rows, and paragraph breaks are
/// inserted where the vertical rhythm jumps.
pub fn assemble(
    layout: &PageLayout,
    contamination: &ContaminationResult,
    options: AssembleOptions,
) -> AssembledText {
    let segments: Vec<&Segment> = layout
        .lines
        .iter()
        .flat_map(|l| l.segments.iter())
        .collect();
    if segments.is_empty() {
        return AssembledText::default();
    }

    let rows = group_rows(&segments, contamination);
    let total_tokens = segments.len();

    // Decide zipping row pairs up front so both outputs agree on structure.
    let zip_with_next = zip_plan(&rows);
    let gaps = row_gaps(&rows);
    let typical_gap = median(&gaps);

    let mut text = String::new();
    let mut raw_text = String::new();
    let mut flagged = Vec::new();
    let mut dropped = 0usize;

    let mut i = 0;
    while i < rows.len() {
        if i > 0 {
            let gap = rows[i].y - rows[i - 1].y;
            let para_break = typical_gap > 0.0 && gap > typical_gap * PARAGRAPH_GAP_FACTOR;
            text.push('\n');
            raw_text.push('\n');
            if para_break {
                text.push('\n');
                raw_text.push('\n');
            }
        }

        if zip_with_next[i] {
            let (zipped, zipped_raw) = zip_rows(&rows[i], &rows[i + 1]);
            push_tokens(&mut text, &mut flagged, &mut dropped, &zipped, options);
            push_raw(&mut raw_text, &zipped_raw);
            i += 2;
        } else {
            let tokens: Vec<(String, bool)> = rows[i]
                .tokens
                .iter()
                .map(|t| (t.seg.text.clone(), t.contaminated))
                .collect();
            push_tokens(&mut text, &mut flagged, &mut dropped, &tokens, options);
            push_raw(&mut raw_text, &tokens.iter().map(|(s, _)| s.clone()).collect::<Vec<_>>());
            i += 1;
        }
    }

    AssembledText {
        text,
        raw_text,
        flagged_spans: flagged,
        excluded_token_ratio: dropped as f32 / total_tokens as f32,
    }
}

fn group_rows<'a>(
    segments: &[&'a Segment],
    contamination: &ContaminationResult,
) -> Vec<Row<'a>> {
    let mut heights: Vec<f32> = segments.iter().map(|s| s.bbox.height).collect();
    heights.sort_by(|a, b| safe_float_cmp(*a, *b));
    let tolerance = MIN_ROW_TOLERANCE.max(median(&heights) * ROW_TOLERANCE_HEIGHT_FACTOR);

    let mut rows: Vec<Row> = Vec::new();
    let mut ordered: Vec<&'a Segment> = segments.to_vec();
    ordered.sort_by(|a, b| {
        safe_float_cmp(a.baseline_y, b.baseline_y).then(safe_float_cmp(a.bbox.x, b.bbox.x))
    });

    for seg in ordered {
        let contaminated = segment_contaminated(seg, contamination);
        match rows
            .iter_mut()
            .find(|r| (r.y - seg.baseline_y).abs() < tolerance)
        {
            Some(row) => row.tokens.push(RowToken { seg, contaminated }),
            None => rows.push(Row {
                y: seg.baseline_y,
                tokens: vec![RowToken { seg, contaminated }],
            }),
        }
    }

    for row in rows.iter_mut() {
        row.tokens
            .sort_by(|a, b| safe_float_cmp(a.seg.bbox.x, b.seg.bbox.x));
    }
    rows
}

/// A segment counts as contaminated when at least half its items are.
fn segment_contaminated(seg: &Segment, contamination: &ContaminationResult) -> bool {
    if seg.items.is_empty() {
        return false;
    }
    let hits = seg
        .items
        .iter()
        .filter(|i| contamination.is_contaminated(i.index))
        .count();
    hits * 2 >= seg.items.len()
}

/// For each row index, whether it zips with the following row.
fn zip_plan(rows: &[Row]) -> Vec<bool> {
    let mut plan = vec![false; rows.len()];
    let mut i = 0;
    while i + 1 < rows.len() {
        let label_row = &rows[i];
        let value_row = &rows[i + 1];
        if label_row.label_fraction() >= LABEL_ROW_FRACTION
            && value_row.label_fraction() <= VALUE_ROW_FRACTION
            && value_row.tokens.len() >= label_row.tokens.len()
        {
            plan[i] = true;
            i += 2;
        } else {
            i += 1;
        }
    }
    plan
}

/// Zip a label row with its value row into `Label: Value` tokens.
fn zip_rows(labels: &Row, values: &Row) -> (Vec<(String, bool)>, Vec<String>) {
    let mut tokens = Vec::new();
    let mut raw = Vec::new();

    for (i, label) in labels.tokens.iter().enumerate() {
        let mut line = label.seg.text.trim().to_string();
        let mut contaminated = label.contaminated;
        if let Some(value) = values.tokens.get(i) {
            line.push(' ');
            line.push_str(value.seg.text.trim());
            contaminated = contaminated || value.contaminated;
        }
        raw.push(line.clone());
        tokens.push((line, contaminated));
    }

    // Value segments beyond the label count trail onto the last pair.
    for extra in values.tokens.iter().skip(labels.tokens.len()) {
        if let (Some((last, contaminated)), Some(last_raw)) = (tokens.last_mut(), raw.last_mut()) {
            last.push(' ');
            last.push_str(extra.seg.text.trim());
            last_raw.push(' ');
            last_raw.push_str(extra.seg.text.trim());
            *contaminated = *contaminated || extra.contaminated;
        }
    }

    (tokens, raw)
}

fn push_tokens(
    text: &mut String,
    flagged: &mut Vec<FlaggedSpan>,
    dropped: &mut usize,
    tokens: &[(String, bool)],
    options: AssembleOptions,
) {
    let mut first = true;
    for (token, contaminated) in tokens {
        if *contaminated && options.filter_contaminated && is_droppable(token) {
            *dropped += 1;
            continue;
        }
        if !first {
            text.push_str("  ");
        }
        let start = text.chars().count();
        text.push_str(token);
        if *contaminated {
            flagged.push(FlaggedSpan {
                start,
                end: start + token.chars().count(),
                kind: SpanKind::ImageOverlap,
            });
        }
        first = false;
    }
}

fn push_raw(raw_text: &mut String, tokens: &[String]) {
    raw_text.push_str(&tokens.join("  "));
}

fn row_gaps(rows: &[Row]) -> Vec<f32> {
    let mut gaps: Vec<f32> = rows.windows(2).map(|w| w[1].y - w[0].y).filter(|g| *g > 0.0).collect();
    gaps.sort_by(|a, b| safe_float_cmp(*a, *b));
    gaps
}

fn median(sorted: &[f32]) -> f32 {
    if sorted.is_empty() {
        return 0.0;
    }
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}
