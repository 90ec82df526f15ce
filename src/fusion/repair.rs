//! Fragment repair: replace truncated native narrative lines with OCR
//! superstrings that carry the lost tail.

use crate::utils::safe_float_cmp;

/// Maximum character length for a line to read as a truncated fragment.
const FRAGMENT_MAX_LEN: usize = 60;

/// Minimum combined score for a repair candidate to win.
const REPAIR_MIN_SCORE: f32 = 0.73;

/// Penalty per unit of relative length surplus of the candidate.
const LENGTH_DELTA_PENALTY_SCALE: f32 = 0.05;

/// Cap on the length-delta penalty.
const LENGTH_DELTA_PENALTY_CAP: f32 = 0.15;

/// Weight of the candidate's junk density in the penalty.
const JUNK_PENALTY_SCALE: f32 = 0.3;

/// Whether a native line reads as a truncated narrative fragment:
/// lowercase start, sentence-terminal end, short, and free of the
/// separator punctuation that marks labels and lists.
pub fn is_truncated_fragment(line: &str) -> bool {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.chars().count() > FRAGMENT_MAX_LEN {
        return false;
    }
    let starts_lower = trimmed
        .chars()
        .find(|c| c.is_alphabetic())
        .is_some_and(|c| c.is_lowercase());
    let ends_sentence = matches!(trimmed.chars().last(), Some('.') | Some('!') | Some('?'));
    let has_separator = trimmed.contains(':') || trimmed.contains(';');
    starts_lower && ends_sentence && !has_separator
}

/// Fraction of characters that are neither alphanumeric nor whitespace.
pub fn junk_density(text: &str) -> f32 {
    let total = text.chars().count();
    if total == 0 {
        return 0.0;
    }
    let junk = text
        .chars()
        .filter(|c| !c.is_alphanumeric() && !c.is_whitespace())
        .count();
    junk as f32 / total as f32
}

/// Find the best OCR superstring for a truncated fragment.
///
/// Candidates are OCR lines longer than the fragment whose prefix aligns
/// with the fragment's stem (normalized edit-distance similarity), scored
/// with penalties for excessive extra length and junk density.
pub fn find_repair<'a>(fragment: &str, ocr_lines: &[&'a str]) -> Option<&'a str> {
    let stem: String = fragment
        .trim()
        .trim_end_matches(['.', '!', '?'])
        .trim_end()
        .to_lowercase();
    let stem_len = stem.chars().count();
    if stem_len == 0 {
        return None;
    }

    let mut best: Option<(f32, &str)> = None;
    for candidate in ocr_lines {
        let trimmed = candidate.trim();
        let candidate_len = trimmed.chars().count();
        if candidate_len <= stem_len {
            continue;
        }

        let prefix: String = trimmed.to_lowercase().chars().take(stem_len).collect();
        let similarity = strsim::normalized_levenshtein(&stem, &prefix) as f32;

        let extra = (candidate_len - stem_len) as f32 / stem_len as f32;
        let length_penalty = (extra * LENGTH_DELTA_PENALTY_SCALE).min(LENGTH_DELTA_PENALTY_CAP);
        let junk_penalty = junk_density(trimmed) * JUNK_PENALTY_SCALE;

        let score = similarity - length_penalty - junk_penalty;
        if score >= REPAIR_MIN_SCORE
            && best.map_or(true, |(s, _)| safe_float_cmp(score, s).is_gt())
        {
            best = Some((score, *candidate));
        }
    }

    best.map(|(_, line)| line)
}

/// Repair truncated fragments in native text using OCR lines.
///
/// Returns the repaired text and the number of lines replaced.
pub fn repair_fragments(native: &str, ocr_lines: &[&str]) -> (String, usize) {
    let mut repaired = 0usize;
    let lines: Vec<String> = native
        .lines()
        .map(|line| {
            if is_truncated_fragment(line) {
                if let Some(replacement) = find_repair(line, ocr_lines) {
                    log::debug!("repaired fragment '{}' -> '{}'", line.trim(), replacement.trim());
                    repaired += 1;
                    return replacement.trim().to_string();
                }
            }
            line.to_string()
        })
        .collect();
    (lines.join("\n"), repaired)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragment_shape() {
        assert!(is_truncated_fragment("the scope was advanced into the."));
        assert!(is_truncated_fragment("was tolerated well."));
        assert!(!is_truncated_fragment("The scope was advanced."));
        assert!(!is_truncated_fragment("medications: midazolam."));
        assert!(!is_truncated_fragment("the scope was advanced into the airway without difficulty and all segments were seen."));
        assert!(!is_truncated_fragment("no trailing punctuation here"));
    }

    #[test]
    fn test_junk_density() {
        assert_eq!(junk_density("clean words"), 0.0);
        assert!(junk_density("~~|#!") > 0.9);
    }

    #[test]
    fn test_repair_example() {
        let ocr = vec![
            "Preoperative vitals were within normal limits.",
            "the scope was advanced into the right mainstem bronchus without difficulty.",
        ];
        let repaired = find_repair("the scope was advanced into the.", &ocr).unwrap();
        assert!(repaired.ends_with("bronchus without difficulty."));
    }

    #[test]
    fn test_repair_rejects_dissimilar_lines() {
        let ocr = vec!["completely different sentence about something else entirely."];
        assert!(find_repair("the scope was advanced into the.", &ocr).is_none());
    }

    #[test]
    fn test_repair_rejects_junky_candidates() {
        let ocr = vec!["the scope was advanced into the ~~~||| ### @@@ %%% &&& *** |||~~~###."];
        assert!(find_repair("the scope was advanced into the.", &ocr).is_none());
    }

    #[test]
    fn test_repair_fragments_in_text() {
        let native = "PROCEDURE: flexible bronchoscopy\nthe scope was advanced into the.\nThe patient tolerated the procedure well.";
        let ocr = vec![
            "the scope was advanced into the right mainstem bronchus without difficulty.",
        ];
        let (text, count) = repair_fragments(native, &ocr);
        assert_eq!(count, 1);
        assert!(text.contains("right mainstem bronchus without difficulty."));
        assert!(text.contains("PROCEDURE: flexible bronchoscopy"));
    }

    #[test]
    fn test_no_repair_leaves_text_unchanged() {
        let native = "The patient tolerated the procedure well.";
        let (text, count) = repair_fragments(native, &[]);
        assert_eq!(count, 0);
        assert_eq!(text, native);
    }
}
