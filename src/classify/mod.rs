//! Multi-signal page classifier: decide whether a page needs OCR, needs a
//! targeted backfill pass, or can trust its native text layer.

pub mod fragmentation;
pub mod stats;

pub use fragmentation::{BackfillVote, FragmentationSignal};
pub use stats::{estimate_completeness_confidence, score_contamination, PageStats};

use fragmentation::{backfill_vote, count_row_breaks, detect_fragmentation, short_line_ratio};

/// Severity at or above which a page needs full OCR.
const NEEDS_OCR_THRESHOLD: f32 = 0.5;

// Signal weights. Empirically tuned; kept verbatim.
const W_SPARSE_TEXT: f32 = 0.35;
const W_CHAR_FRAGMENTATION: f32 = 0.23;
const W_NON_PRINTABLE: f32 = 0.2;
const W_LOW_ALPHA: f32 = 0.15;
const W_SHORT_MEDIAN_TOKEN: f32 = 0.1;
const W_FRAGMENTED_LINES: f32 = 0.58;
const W_BACKFILL_SIGNALS: f32 = 0.52;
const W_IMAGE_HEAVY_LOW_TEXT: f32 = 0.32;
const W_HIGH_OVERLAP: f32 = 0.31;
const W_HIGH_CONTAMINATION: f32 = 0.33;
const W_LOW_COMPLETENESS: f32 = 0.45;

// Signal thresholds.
const SPARSE_CHAR_COUNT: usize = 80;
const SINGLE_CHAR_RATIO: f32 = 0.55;
const NON_PRINTABLE_RATIO: f32 = 0.08;
const LOW_ALPHA_RATIO: f32 = 0.45;
const SHORT_MEDIAN_TOKEN: f32 = 3.0;
const IMAGE_HEAVY_MIN_OPS: usize = 2;
const IMAGE_HEAVY_MAX_CHARS: usize = 300;
const OVERLAP_SIGNAL: f32 = 0.18;
const CONTAMINATION_SIGNAL: f32 = 0.24;
const LOW_COMPLETENESS: f32 = 0.72;

/// Native-density bypass floor, in characters per square page unit.
pub const DENSITY_BYPASS_FLOOR: f32 = 0.0025;

/// Minimum alpha ratio for the native-density bypass.
const BYPASS_MIN_ALPHA: f32 = 0.55;

/// Tags describing why a page was classified the way it was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QualityFlag {
    /// Very little native text on the page.
    SparseText,
    /// Items are mostly single glyphs (shredded text layer).
    CharFragmentation,
    /// Non-printable characters in the native text.
    NonPrintable,
    /// Low fraction of alphabetic characters.
    LowAlphaRatio,
    /// Median token is suspiciously short.
    ShortMedianToken,
    /// Native lines show sentence fragmentation.
    FragmentedLines,
    /// The backfill vote fired.
    BackfillSignals,
    /// Many images with little text.
    ImageHeavyLowText,
    /// Text overlaps imagery heavily.
    HighOverlap,
    /// Contamination score above threshold.
    HighContamination,
    /// Completeness confidence below threshold.
    LowCompleteness,
    /// The native-density bypass short-circuited the decision.
    NativeDensityBypass,
}

/// Decision record for one page.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct Classification {
    /// Whether the page needs full OCR.
    pub needs_ocr: bool,
    /// Whether a targeted backfill pass is warranted instead.
    pub needs_ocr_backfill: bool,
    /// Confidence in the decision, `[0, 1]`.
    pub confidence: f32,
    /// Why the decision came out this way.
    pub quality_flags: Vec<QualityFlag>,
    /// Human-readable summary of the decisive signals.
    pub reason: String,
    /// Fragmentation sub-result.
    pub fragmentation: FragmentationSignal,
    /// Backfill sub-result.
    pub backfill: BackfillVote,
    /// The combined severity score the decision was made on.
    pub severity: f32,
}

/// Classify a page from its statistics and assembled native text.
///
/// State-free: the same `(stats, text)` always produces the same decision.
/// Signals are combined additively into a severity score; a native-density
/// bypass short-circuits to "trust the native layer" when density, alpha
/// ratio, and fragmentation are all favorable.
pub fn classify(stats: &PageStats, text: &str) -> Classification {
    let fragmentation = detect_fragmentation(text);
    let backfill = backfill_vote(
        &fragmentation,
        short_line_ratio(text),
        count_row_breaks(text),
        stats.native_text_density / DENSITY_BYPASS_FLOOR,
    );

    if stats.native_text_density >= DENSITY_BYPASS_FLOOR
        && stats.alpha_ratio >= BYPASS_MIN_ALPHA
        && !fragmentation.detected
        && !backfill.needed
    {
        log::debug!(
            "density bypass: density={:.5} alpha={:.2}",
            stats.native_text_density,
            stats.alpha_ratio
        );
        return Classification {
            needs_ocr: false,
            needs_ocr_backfill: false,
            confidence: 0.9,
            quality_flags: vec![QualityFlag::NativeDensityBypass],
            reason: "dense native text with healthy alpha ratio and no fragmentation".to_string(),
            fragmentation,
            backfill,
            severity: 0.0,
        };
    }

    let mut severity = 0.0f32;
    let mut flags = Vec::new();
    let mut reasons: Vec<String> = Vec::new();

    let mut signal = |fired: bool, weight: f32, flag: QualityFlag, label: &str| {
        if fired {
            severity += weight;
            flags.push(flag);
            reasons.push(label.to_string());
        }
    };

    signal(
        stats.char_count < SPARSE_CHAR_COUNT,
        W_SPARSE_TEXT,
        QualityFlag::SparseText,
        "sparse native text",
    );
    signal(
        stats.single_char_item_ratio >= SINGLE_CHAR_RATIO,
        W_CHAR_FRAGMENTATION,
        QualityFlag::CharFragmentation,
        "single-glyph items dominate",
    );
    signal(
        stats.non_printable_ratio >= NON_PRINTABLE_RATIO,
        W_NON_PRINTABLE,
        QualityFlag::NonPrintable,
        "non-printable characters",
    );
    signal(
        stats.alpha_ratio < LOW_ALPHA_RATIO && stats.char_count > 0,
        W_LOW_ALPHA,
        QualityFlag::LowAlphaRatio,
        "low alphabetic ratio",
    );
    signal(
        stats.median_token_len > 0.0 && stats.median_token_len < SHORT_MEDIAN_TOKEN,
        W_SHORT_MEDIAN_TOKEN,
        QualityFlag::ShortMedianToken,
        "short median token",
    );
    signal(
        fragmentation.detected,
        W_FRAGMENTED_LINES,
        QualityFlag::FragmentedLines,
        "fragmented native lines",
    );
    signal(
        backfill.needed,
        W_BACKFILL_SIGNALS,
        QualityFlag::BackfillSignals,
        "backfill vote fired",
    );
    signal(
        stats.image_op_count >= IMAGE_HEAVY_MIN_OPS && stats.char_count < IMAGE_HEAVY_MAX_CHARS,
        W_IMAGE_HEAVY_LOW_TEXT,
        QualityFlag::ImageHeavyLowText,
        "image-heavy page with little text",
    );
    signal(
        stats.overlap_ratio >= OVERLAP_SIGNAL,
        W_HIGH_OVERLAP,
        QualityFlag::HighOverlap,
        "text overlaps imagery",
    );
    signal(
        stats.contamination_score >= CONTAMINATION_SIGNAL,
        W_HIGH_CONTAMINATION,
        QualityFlag::HighContamination,
        "contamination score high",
    );
    signal(
        stats.completeness_confidence < LOW_COMPLETENESS,
        W_LOW_COMPLETENESS,
        QualityFlag::LowCompleteness,
        "completeness confidence low",
    );

    let needs_ocr = severity >= NEEDS_OCR_THRESHOLD || backfill.needed;
    let confidence = ((severity - NEEDS_OCR_THRESHOLD).abs() * 2.0).clamp(0.2, 1.0);

    let reason = if reasons.is_empty() {
        "no adverse signals".to_string()
    } else {
        reasons.join("; ")
    };

    Classification {
        needs_ocr,
        needs_ocr_backfill: backfill.needed,
        confidence,
        quality_flags: flags,
        reason,
        fragmentation,
        backfill,
        severity,
    }
}
