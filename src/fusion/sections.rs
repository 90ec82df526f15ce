//! Section bucketing and the hybrid section merge.
//!
//! Clinical narrative pages share a small vocabulary of section headers.
//! The matcher is an ordered rule table evaluated in sequence; buckets keep
//! document order so a merge can work section by section.

use lazy_static::lazy_static;
use regex::Regex;

use crate::fusion::repair::is_truncated_fragment;

/// Two lines sharing at least this token overlap are duplicates.
pub const TOKEN_OVERLAP_DUPLICATE: f32 = 0.75;

/// Minimum similarity for a wholesale section replacement.
pub const SECTION_REPLACE_SIMILARITY: f32 = 0.58;

/// A narrative section shorter than this reads as truncated.
const NARRATIVE_TRUNCATED_LEN: usize = 90;

/// Section identity in the fixed header vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum SectionKind {
    /// Content before the first recognized header.
    Preamble,
    /// Procedure performed.
    Procedure,
    /// Indications for the procedure.
    Indications,
    /// Instruments used.
    Instruments,
    /// Medications administered.
    Medications,
    /// Technique description.
    Technique,
    /// Findings.
    Findings,
    /// Diagnosis.
    Diagnosis,
    /// Recommendations / plan.
    Recommendations,
    /// ICD / CPT code lists.
    Codes,
}

lazy_static! {
    /// Ordered (matcher, section) rules, evaluated in sequence.
    static ref SECTION_RULES: Vec<(Regex, SectionKind)> = vec![
        (Regex::new(r"(?i)^\s*procedure(\s+performed)?\s*:").expect("static pattern"), SectionKind::Procedure),
        (Regex::new(r"(?i)^\s*indications?\s*:").expect("static pattern"), SectionKind::Indications),
        (Regex::new(r"(?i)^\s*instruments?\s*:").expect("static pattern"), SectionKind::Instruments),
        (Regex::new(r"(?i)^\s*medications?\s*:").expect("static pattern"), SectionKind::Medications),
        (Regex::new(r"(?i)^\s*technique\s*:").expect("static pattern"), SectionKind::Technique),
        (Regex::new(r"(?i)^\s*findings?\s*:").expect("static pattern"), SectionKind::Findings),
        (Regex::new(r"(?i)^\s*(post[\s-]?op(erative)?\s+)?diagnos[ie]s\s*:").expect("static pattern"), SectionKind::Diagnosis),
        (Regex::new(r"(?i)^\s*(recommendations?|plan)\s*:").expect("static pattern"), SectionKind::Recommendations),
        (Regex::new(r"(?i)^\s*(icd|cpt)[\s-]?(10|9)?\s*(codes?)?\s*:").expect("static pattern"), SectionKind::Codes),
    ];
}

/// One bucketed section: its kind and its lines (header line included).
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    /// Which header opened the section.
    pub kind: SectionKind,
    /// Lines in document order; the header line is first when present.
    pub lines: Vec<String>,
}

impl Section {
    /// Section body as one string (header line included).
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    /// Total character length of the section.
    pub fn len(&self) -> usize {
        self.lines.iter().map(|l| l.chars().count()).sum()
    }

    /// Whether the section holds no lines.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Match a line against the section-header rule table.
pub fn match_section_header(line: &str) -> Option<SectionKind> {
    SECTION_RULES
        .iter()
        .find(|(pattern, _)| pattern.is_match(line))
        .map(|(_, kind)| *kind)
}

/// Bucket text into sections by header lines, preserving document order.
pub fn bucket_sections(text: &str) -> Vec<Section> {
    let mut sections: Vec<Section> = Vec::new();
    let mut current = Section {
        kind: SectionKind::Preamble,
        lines: Vec::new(),
    };

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(kind) = match_section_header(trimmed) {
            if !current.is_empty() {
                sections.push(current);
            }
            current = Section {
                kind,
                lines: vec![trimmed.to_string()],
            };
        } else {
            current.lines.push(trimmed.to_string());
        }
    }
    if !current.is_empty() {
        sections.push(current);
    }
    sections
}

/// Token overlap between two lines: shared tokens over the smaller set.
pub fn token_overlap(a: &str, b: &str) -> f32 {
    let tokens = |s: &str| {
        s.split_whitespace()
            .map(|t| {
                t.chars()
                    .filter(|c| c.is_alphanumeric())
                    .collect::<String>()
                    .to_lowercase()
            })
            .filter(|t| !t.is_empty())
            .collect::<std::collections::HashSet<String>>()
    };
    let ta = tokens(a);
    let tb = tokens(b);
    let smaller = ta.len().min(tb.len());
    if smaller == 0 {
        return 0.0;
    }
    let shared = ta.intersection(&tb).count();
    shared as f32 / smaller as f32
}

/// Whether a section reads as truncated: short narrative, a body that ends
/// mid-phrase, or an unterminated fragment inside it.
pub fn section_is_truncated(section: &Section) -> bool {
    let body: Vec<&String> = section.lines.iter().skip(1).collect();
    if body.is_empty() {
        return true;
    }
    let body_len: usize = body.iter().map(|l| l.chars().count()).sum();
    if body_len < NARRATIVE_TRUNCATED_LEN {
        return true;
    }
    if let Some(last) = body.last() {
        let end = last.trim_end().chars().last();
        if !matches!(end, Some('.') | Some('!') | Some('?') | Some(':')) {
            return true;
        }
    }
    body.iter().any(|l| is_truncated_fragment(l))
}

/// Section-wise hybrid merge of native and OCR text.
///
/// Native sections keep their order. A truncated native section is replaced
/// wholesale when the OCR counterpart is longer and similar enough;
/// otherwise OCR lines that are not already represented are appended.
/// OCR-only sections trail at the end.
pub fn merge_hybrid(native: &str, ocr: &str) -> String {
    let native_sections = bucket_sections(native);
    let ocr_sections = bucket_sections(ocr);

    let mut used_ocr: Vec<bool> = vec![false; ocr_sections.len()];
    let mut merged: Vec<String> = Vec::new();

    for section in &native_sections {
        let counterpart = ocr_sections
            .iter()
            .enumerate()
            .find(|(i, s)| !used_ocr[*i] && s.kind == section.kind);

        match counterpart {
            Some((i, ocr_section)) => {
                used_ocr[i] = true;
                let similarity =
                    strsim::normalized_levenshtein(&section.text(), &ocr_section.text()) as f32;
                if section_is_truncated(section)
                    && ocr_section.len() > section.len()
                    && similarity >= SECTION_REPLACE_SIMILARITY
                {
                    log::debug!(
                        "replacing truncated {:?} section (similarity {:.2})",
                        section.kind,
                        similarity
                    );
                    merged.extend(ocr_section.lines.iter().cloned());
                } else {
                    merged.extend(section.lines.iter().cloned());
                    for line in &ocr_section.lines {
                        let duplicate = section
                            .lines
                            .iter()
                            .any(|n| token_overlap(n, line) >= TOKEN_OVERLAP_DUPLICATE);
                        if !duplicate {
                            merged.push(line.clone());
                        }
                    }
                }
            }
            None => merged.extend(section.lines.iter().cloned()),
        }
    }

    for (i, section) in ocr_sections.iter().enumerate() {
        if !used_ocr[i] && section.kind != SectionKind::Preamble {
            merged.extend(section.lines.iter().cloned());
        }
    }

    merged.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_matching() {
        assert_eq!(match_section_header("FINDINGS:"), Some(SectionKind::Findings));
        assert_eq!(
            match_section_header("Procedure Performed: bronchoscopy"),
            Some(SectionKind::Procedure)
        );
        assert_eq!(
            match_section_header("Post-op Diagnosis: stable"),
            Some(SectionKind::Diagnosis)
        );
        assert_eq!(match_section_header("CPT Codes: 31622"), Some(SectionKind::Codes));
        assert_eq!(match_section_header("Plan: follow up"), Some(SectionKind::Recommendations));
        assert_eq!(match_section_header("The patient was stable."), None);
    }

    #[test]
    fn test_bucket_sections_order() {
        let text = "Patient header line\nFINDINGS: mucosa normal\nmore findings\nPLAN: discharge";
        let sections = bucket_sections(text);
        assert_eq!(sections.len(), 3);
        assert_eq!(sections[0].kind, SectionKind::Preamble);
        assert_eq!(sections[1].kind, SectionKind::Findings);
        assert_eq!(sections[1].lines.len(), 2);
        assert_eq!(sections[2].kind, SectionKind::Recommendations);
    }

    #[test]
    fn test_token_overlap() {
        assert_eq!(token_overlap("the quick brown fox", "the quick brown fox"), 1.0);
        assert!(token_overlap("the quick brown fox", "the quick brown fox jumps") >= 0.99);
        assert!(token_overlap("alpha beta", "gamma delta") < 0.01);
        assert_eq!(token_overlap("", "words"), 0.0);
    }

    #[test]
    fn test_truncated_section() {
        let truncated = Section {
            kind: SectionKind::Findings,
            lines: vec!["FINDINGS:".to_string(), "the mucosa was.".to_string()],
        };
        assert!(section_is_truncated(&truncated));

        let complete = Section {
            kind: SectionKind::Findings,
            lines: vec![
                "FINDINGS:".to_string(),
                "The tracheobronchial tree was examined in detail and appeared normal.".to_string(),
                "No endobronchial lesions were identified anywhere in the airway.".to_string(),
            ],
        };
        assert!(!section_is_truncated(&complete));
    }

    #[test]
    fn test_mid_phrase_end_is_truncated() {
        let section = Section {
            kind: SectionKind::Technique,
            lines: vec![
                "TECHNIQUE:".to_string(),
                "The bronchoscope was advanced through the vocal cords and into the".to_string(),
                "airways where all visible segments were carefully inspected and the".to_string(),
            ],
        };
        assert!(section_is_truncated(&section));
    }

    #[test]
    fn test_merge_appends_missing_ocr_lines() {
        let native = "FINDINGS:\nThe mucosa appeared normal throughout all visualized segments today.\nNo masses or lesions were identified in any examined airway branch.";
        let ocr = "FINDINGS:\nThe mucosa appeared normal throughout all visualized segments today.\nMild secretions were suctioned from the right lower lobe.";
        let merged = merge_hybrid(native, ocr);
        assert!(merged.contains("No masses or lesions"));
        assert!(merged.contains("Mild secretions were suctioned"));
        // The duplicated line appears once.
        assert_eq!(merged.matches("mucosa appeared normal").count(), 1);
    }

    #[test]
    fn test_merge_replaces_truncated_section() {
        let native = "FINDINGS:\nThe mucosa appeared normal and the.";
        let ocr = "FINDINGS:\nThe mucosa appeared normal and the airways were free of lesions.";
        let merged = merge_hybrid(native, ocr);
        assert!(merged.contains("free of lesions"));
        assert!(!merged.contains("and the.\n"));
    }

    #[test]
    fn test_merge_keeps_ocr_only_sections() {
        let native = "FINDINGS:\nThe examination was unremarkable in every segment that was seen.";
        let ocr = "MEDICATIONS: midazolam 2mg\nFINDINGS:\nThe examination was unremarkable in every segment that was seen.";
        let merged = merge_hybrid(native, ocr);
        assert!(merged.contains("MEDICATIONS: midazolam 2mg"));
    }
}
