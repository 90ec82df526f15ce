//! Fusion engine integration tests: arbitration, section merge, and
//! fragment repair through the public API.

use text_triage::classify::Classification;
use text_triage::fusion::{arbitrate_page_text, merge_hybrid, SourceDecision};
use text_triage::geometry::Rect;
use text_triage::ocr::{OcrLine, OcrPageOutput, PassMetrics};

fn needs_ocr_classification() -> Classification {
    Classification {
        needs_ocr: true,
        ..Classification::default()
    }
}

fn ocr_output(text: &str) -> OcrPageOutput {
    let lines: Vec<OcrLine> = text
        .lines()
        .enumerate()
        .map(|(i, l)| OcrLine::new(l, Some(86.0), Rect::new(0.0, i as f32 * 18.0, 420.0, 14.0)))
        .collect();
    OcrPageOutput {
        metrics: PassMetrics::measure(&lines, 60.0),
        text: text.to_string(),
        lines,
        ..OcrPageOutput::default()
    }
}

#[test]
fn test_native_kept_when_ocr_unavailable() {
    let result = arbitrate_page_text(
        "Patient: Jane Doe",
        None,
        &Classification::default(),
        0.0,
        0.9,
    );
    assert_eq!(result.source, SourceDecision::Native);
    assert_eq!(result.text, "Patient: Jane Doe");
    assert!(!result.blocked);
}

#[test]
fn test_blocked_when_required_ocr_missing() {
    let result = arbitrate_page_text("", None, &needs_ocr_classification(), 0.3, 0.2);
    assert!(result.blocked);
    assert!(!result.reason.is_empty());
}

#[test]
fn test_ocr_wins_over_empty_native() {
    let ocr = ocr_output("Procedure note text");
    let result = arbitrate_page_text("", Some(&ocr), &needs_ocr_classification(), 0.0, 0.1);
    assert_eq!(result.source, SourceDecision::Ocr);
    assert_eq!(result.text, "Procedure note text");
}

#[test]
fn test_long_ocr_with_contamination_goes_hybrid() {
    let native = "FINDINGS:\nshort note.";
    let ocr_text = "FINDINGS:\nThe airways were examined in order and appeared entirely normal today.\nNo lesions or masses were identified in any segment of either lung.\nSecretions were suctioned and the examination was completed without issue.";
    let ocr = ocr_output(ocr_text);
    // OCR is more than 3x native and contamination is high.
    let result = arbitrate_page_text(native, Some(&ocr), &needs_ocr_classification(), 0.4, 0.4);
    assert_eq!(result.source, SourceDecision::Hybrid);
    assert!(result.text.contains("No lesions or masses"));
}

#[test]
fn test_fragment_repair_through_arbitration() {
    let native = "TECHNIQUE:\nthe scope was advanced into the.\nThe remainder of the examination was completed and documented in detail.";
    let ocr_text = "TECHNIQUE:\nthe scope was advanced into the right mainstem bronchus without difficulty.\nThe remainder of the examination was completed and documented in detail.";
    let ocr = ocr_output(ocr_text);

    let result = arbitrate_page_text(native, Some(&ocr), &Classification::default(), 0.3, 0.7);
    assert_eq!(result.source, SourceDecision::Hybrid);
    assert!(result.repaired_fragments >= 1);
    assert!(result
        .text
        .contains("the scope was advanced into the right mainstem bronchus without difficulty."));
}

#[test]
fn test_section_merge_preserves_native_order() {
    let native = "PROCEDURE: flexible bronchoscopy\nFINDINGS:\nThe mucosa was normal in appearance throughout the entire visualized airway.";
    let ocr = "FINDINGS:\nThe mucosa was normal in appearance throughout the entire visualized airway.\nMild erythema was noted at the right upper lobe orifice on closer review.\nRECOMMENDATIONS: routine follow-up";
    let merged = merge_hybrid(native, ocr);

    let procedure_pos = merged.find("PROCEDURE").unwrap();
    let findings_pos = merged.find("FINDINGS").unwrap();
    let recommendations_pos = merged.find("RECOMMENDATIONS").unwrap();
    assert!(procedure_pos < findings_pos);
    assert!(findings_pos < recommendations_pos);
    assert!(merged.contains("Mild erythema"));
}

#[test]
fn test_fusion_result_serializes() {
    let result = arbitrate_page_text("Some text", None, &Classification::default(), 0.0, 0.8);
    let json = serde_json::to_string(&result).unwrap();
    assert!(json.contains("\"source\":\"native\""));
}
