//! Native/OCR arbitration: decide per page whether to keep the native text
//! layer, replace it with recognition output, or merge the two.

pub mod repair;
pub mod sections;

pub use repair::{is_truncated_fragment, repair_fragments};
pub use sections::{bucket_sections, merge_hybrid, SectionKind};

use crate::classify::{Classification, QualityFlag};
use crate::ocr::OcrPageOutput;

/// OCR must be longer than native by this factor to displace it.
const OCR_LONGER_FACTOR: f32 = 1.25;

/// Contamination score at which a longer OCR result merges instead of
/// replacing outright.
const HYBRID_CONTAMINATION_MIN: f32 = 0.24;

/// Confidence assigned to an OCR-only result.
const OCR_ONLY_CONFIDENCE: f32 = 0.8;

/// Which source produced the page text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceDecision {
    /// Embedded text layer.
    Native,
    /// Recognition output.
    Ocr,
    /// Section-wise merge of both.
    Hybrid,
}

/// Arbitration result for one page.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct FusionResult {
    /// Which source won.
    pub source: SourceDecision,
    /// The page text.
    pub text: String,
    /// Why the arbitration came out this way.
    pub reason: String,
    /// Confidence in the output, `[0, 1]`.
    pub confidence: f32,
    /// Whether the page is blocked: OCR was required but unavailable, or
    /// neither source had content.
    pub blocked: bool,
    /// Fragments repaired during a hybrid merge.
    pub repaired_fragments: usize,
}

/// Arbitrate between native and recognized text for one page.
///
/// The decision ladder:
/// 1. Dense, unfragmented native text bypasses arbitration entirely.
/// 2. No OCR available: native wins; blocked when OCR was required.
/// 3. Only one source has content: it wins.
/// 4. Neither has content: empty and blocked.
/// 5. Both have content: compare lengths and contamination; much-longer
///    OCR replaces native outright unless contamination argues for a
///    section-wise hybrid merge.
pub fn arbitrate_page_text(
    native: &str,
    ocr: Option<&OcrPageOutput>,
    classification: &Classification,
    contamination_score: f32,
    completeness_confidence: f32,
) -> FusionResult {
    let native_trimmed = native.trim();

    // 1. Native bypass.
    if classification
        .quality_flags
        .contains(&QualityFlag::NativeDensityBypass)
    {
        return FusionResult {
            source: SourceDecision::Native,
            text: native_trimmed.to_string(),
            reason: "dense native layer, no fragmentation or backfill need".to_string(),
            confidence: completeness_confidence.max(0.9),
            blocked: false,
            repaired_fragments: 0,
        };
    }

    // 2. OCR unavailable. An output that ran but found nothing is NOT
    // unavailable; it falls through to the single-source cases.
    let ocr = match ocr {
        Some(o) => o,
        None => {
            let required = classification.needs_ocr;
            return FusionResult {
                source: SourceDecision::Native,
                text: native_trimmed.to_string(),
                reason: if required {
                    "recognition required but unavailable".to_string()
                } else {
                    "recognition not required".to_string()
                },
                confidence: completeness_confidence,
                blocked: required,
                repaired_fragments: 0,
            };
        }
    };

    let ocr_text = ocr.text.trim();
    let ocr_confidence = if ocr.metrics.mean_line_confidence > 0.0 {
        ocr.metrics.mean_line_confidence / 100.0
    } else {
        OCR_ONLY_CONFIDENCE
    };

    // 3. Single-source cases.
    if native_trimmed.is_empty() && ocr_text.is_empty() {
        // 4. Nothing anywhere.
        return FusionResult {
            source: SourceDecision::Native,
            text: String::new(),
            reason: "no text from either source".to_string(),
            confidence: 0.0,
            blocked: true,
            repaired_fragments: 0,
        };
    }
    if native_trimmed.is_empty() {
        return FusionResult {
            source: SourceDecision::Ocr,
            text: ocr_text.to_string(),
            reason: "native layer empty".to_string(),
            confidence: OCR_ONLY_CONFIDENCE,
            blocked: false,
            repaired_fragments: 0,
        };
    }
    if ocr_text.is_empty() {
        return FusionResult {
            source: SourceDecision::Native,
            text: native_trimmed.to_string(),
            reason: "recognition produced nothing".to_string(),
            confidence: completeness_confidence,
            blocked: false,
            repaired_fragments: 0,
        };
    }

    // 5. Both present: compare.
    let native_len = native_trimmed.chars().count() as f32;
    let ocr_len = ocr_text.chars().count() as f32;
    let ocr_much_longer = ocr_len > native_len * OCR_LONGER_FACTOR;

    if ocr_much_longer && contamination_score < HYBRID_CONTAMINATION_MIN {
        return FusionResult {
            source: SourceDecision::Ocr,
            text: ocr_text.to_string(),
            reason: format!(
                "recognition recovered {:.1}x the native text",
                ocr_len / native_len.max(1.0)
            ),
            confidence: ocr_confidence,
            blocked: false,
            repaired_fragments: 0,
        };
    }

    let ocr_lines: Vec<&str> = ocr_text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
    let (repaired_native, repaired_fragments) = repair_fragments(native_trimmed, &ocr_lines);
    let merged = merge_hybrid(&repaired_native, ocr_text);

    let reason = if ocr_much_longer {
        "recognition much longer under high contamination, merged by section".to_string()
    } else {
        "both sources contribute, merged by section".to_string()
    };

    FusionResult {
        source: SourceDecision::Hybrid,
        text: merged,
        reason,
        confidence: (completeness_confidence + ocr_confidence) / 2.0,
        blocked: false,
        repaired_fragments,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{BackfillVote, FragmentationSignal};
    use crate::geometry::Rect;
    use crate::ocr::{OcrLine, PassMetrics};

    fn classification(needs_ocr: bool, bypass: bool) -> Classification {
        Classification {
            needs_ocr,
            needs_ocr_backfill: false,
            confidence: 0.8,
            quality_flags: if bypass {
                vec![QualityFlag::NativeDensityBypass]
            } else {
                vec![]
            },
            reason: String::new(),
            fragmentation: FragmentationSignal::default(),
            backfill: BackfillVote::default(),
            severity: 0.0,
        }
    }

    fn ocr_output(text: &str, confidence: f32) -> OcrPageOutput {
        let lines: Vec<OcrLine> = text
            .lines()
            .enumerate()
            .map(|(i, l)| {
                OcrLine::new(l, Some(confidence), Rect::new(0.0, i as f32 * 16.0, 400.0, 14.0))
            })
            .collect();
        OcrPageOutput {
            metrics: PassMetrics::measure(&lines, 60.0),
            text: text.to_string(),
            lines,
            ..OcrPageOutput::default()
        }
    }

    #[test]
    fn test_native_when_ocr_unavailable_and_not_required() {
        let result = arbitrate_page_text(
            "Patient: Jane Doe",
            None,
            &classification(false, false),
            0.0,
            0.9,
        );
        assert_eq!(result.source, SourceDecision::Native);
        assert!(!result.blocked);
        assert_eq!(result.text, "Patient: Jane Doe");
    }

    #[test]
    fn test_blocked_when_ocr_required_but_unavailable() {
        let result = arbitrate_page_text("", None, &classification(true, false), 0.0, 0.3);
        assert!(result.blocked);
        assert_eq!(result.source, SourceDecision::Native);
    }

    #[test]
    fn test_ocr_only_when_native_empty() {
        let ocr = ocr_output("Procedure note text", 85.0);
        let result = arbitrate_page_text("", Some(&ocr), &classification(true, false), 0.0, 0.2);
        assert_eq!(result.source, SourceDecision::Ocr);
        assert_eq!(result.text, "Procedure note text");
        assert!(!result.blocked);
    }

    #[test]
    fn test_both_empty_blocked() {
        let ocr = ocr_output("", 0.0);
        let result = arbitrate_page_text("", Some(&ocr), &classification(true, false), 0.0, 0.0);
        assert!(result.blocked);
        assert!(result.text.is_empty());
    }

    #[test]
    fn test_native_bypass_skips_arbitration() {
        let ocr = ocr_output("should be ignored entirely", 90.0);
        let result = arbitrate_page_text(
            "Dense native page text.",
            Some(&ocr),
            &classification(false, true),
            0.0,
            0.95,
        );
        assert_eq!(result.source, SourceDecision::Native);
        assert_eq!(result.text, "Dense native page text.");
    }

    #[test]
    fn test_much_longer_ocr_with_contamination_goes_hybrid() {
        let native = "FINDINGS:\nshort native.";
        let ocr_text = "FINDINGS:\nThe mucosa appeared normal throughout all segments inspected today.\nNo endobronchial lesions were seen in any of the examined airways.\nSecretions were suctioned clear from both lower lobes.";
        let ocr = ocr_output(ocr_text, 85.0);
        let result =
            arbitrate_page_text(native, Some(&ocr), &classification(true, false), 0.4, 0.5);
        assert_eq!(result.source, SourceDecision::Hybrid);
    }

    #[test]
    fn test_much_longer_clean_ocr_replaces() {
        let native = "short native.";
        let ocr = ocr_output(
            "A much longer recognition result with far more recovered content than native.",
            85.0,
        );
        let result =
            arbitrate_page_text(native, Some(&ocr), &classification(true, false), 0.05, 0.5);
        assert_eq!(result.source, SourceDecision::Ocr);
    }

    #[test]
    fn test_comparable_lengths_go_hybrid() {
        let native = "FINDINGS:\nThe mucosa appeared normal throughout the visualized airway segments.";
        let ocr = ocr_output(
            "FINDINGS:\nThe mucosa appeared normal throughout the visualized airway segments.",
            85.0,
        );
        let result =
            arbitrate_page_text(native, Some(&ocr), &classification(false, false), 0.1, 0.8);
        assert_eq!(result.source, SourceDecision::Hybrid);
    }

    #[test]
    fn test_hybrid_repairs_fragments() {
        let native = "TECHNIQUE:\nthe scope was advanced into the.\nThe patient tolerated the procedure well and was transferred to recovery.";
        let ocr_text = "TECHNIQUE:\nthe scope was advanced into the right mainstem bronchus without difficulty.\nThe patient tolerated the procedure well and was transferred to recovery.";
        let ocr = ocr_output(ocr_text, 88.0);
        let result =
            arbitrate_page_text(native, Some(&ocr), &classification(false, false), 0.3, 0.7);
        assert_eq!(result.source, SourceDecision::Hybrid);
        assert!(result.repaired_fragments >= 1);
        assert!(result.text.contains("right mainstem bronchus without difficulty."));
    }
}
