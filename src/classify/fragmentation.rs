//! Native-line fragmentation detection and the backfill vote.
//!
//! A fragmented text layer shows up as short, lowercase-initial lines that
//! end mid-thought with sentence punctuation — the tail of a sentence whose
//! head was lost. When enough of them cluster, a targeted backfill OCR pass
//! is worth its cost.

/// Maximum character length for an orphan-continuation candidate line.
const CANDIDATE_MAX_LEN: usize = 45;

/// Maximum word count for a candidate line.
const CANDIDATE_MAX_WORDS: usize = 5;

/// Candidates required before fragmentation is considered.
const MIN_CANDIDATES: usize = 3;

/// Bridged orphans required before fragmentation is considered.
const MIN_ORPHANS: usize = 2;

/// Candidate fraction of all non-empty lines required.
const MIN_CANDIDATE_RATIO: f32 = 0.18;

// Backfill vote weights. Empirically tuned; kept verbatim.
const VOTE_FRAGMENTATION: f32 = 2.3;
const VOTE_ORPHAN_LINES: f32 = 1.8;
const VOTE_SHORT_LINES: f32 = 1.3;
const VOTE_ROW_BREAKS: f32 = 0.8;
const VOTE_MESSY_DENSITY: f32 = 0.6;

/// A vote is "strong" at or above this weight.
const STRONG_VOTE_WEIGHT: f32 = 1.3;

/// Minimum line count for backfill to be considered at all.
const BACKFILL_MIN_LINES: usize = 8;

/// Severity threshold for the backfill decision.
const BACKFILL_MIN_SEVERITY: f32 = 3.15;

/// Short-line ratio threshold for the short-lines vote.
const SHORT_LINE_RATIO: f32 = 0.5;

/// Lines under this length count as short.
const SHORT_LINE_LEN: usize = 40;

/// Row-fragment breaks required for the row-breaks vote.
const MIN_ROW_BREAKS: usize = 3;

/// Density band (relative to the bypass floor) for the messy-density vote.
const MESSY_DENSITY_LOW: f32 = 0.4;

/// Result of scanning native lines for fragmentation evidence.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct FragmentationSignal {
    /// Whether fragmentation was declared.
    pub detected: bool,
    /// Orphan-continuation candidate lines.
    pub candidate_count: usize,
    /// Candidates bridged by a sentence end above and a capitalized start
    /// below — the strongest fragment evidence.
    pub orphan_count: usize,
    /// Candidates over all non-empty lines.
    pub candidate_ratio: f32,
    /// Non-empty lines scanned.
    pub line_count: usize,
}

/// The five-signal backfill vote.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct BackfillVote {
    /// Whether a targeted backfill pass is warranted.
    pub needed: bool,
    /// Weighted severity of the firing signals.
    pub severity: f32,
    /// Number of signals that fired.
    pub votes: usize,
    /// Number of strong signals that fired.
    pub strong_votes: usize,
}

fn ends_sentence(line: &str) -> bool {
    matches!(line.trim_end().chars().last(), Some('.') | Some('!') | Some('?'))
}

fn starts_lowercase(line: &str) -> bool {
    line.trim_start()
        .chars()
        .find(|c| c.is_alphabetic())
        .is_some_and(|c| c.is_lowercase())
}

fn starts_uppercase(line: &str) -> bool {
    line.trim_start()
        .chars()
        .find(|c| c.is_alphabetic())
        .is_some_and(|c| c.is_uppercase())
}

/// Whether a single line has the orphan-continuation shape. Used by the
/// planner to pick backfill target lines.
pub fn is_fragment_candidate(line: &str) -> bool {
    is_candidate(line)
}

fn is_candidate(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty()
        && trimmed.chars().count() <= CANDIDATE_MAX_LEN
        && trimmed.split_whitespace().count() <= CANDIDATE_MAX_WORDS
        && starts_lowercase(trimmed)
        && ends_sentence(trimmed)
}

/// Scan assembled native text for orphan-continuation fragments.
pub fn detect_fragmentation(text: &str) -> FragmentationSignal {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();

    let mut candidate_count = 0usize;
    let mut orphan_count = 0usize;

    for (i, line) in lines.iter().enumerate() {
        if !is_candidate(line) {
            continue;
        }
        candidate_count += 1;

        // Bridge: the line above finished a sentence and the line below
        // starts a new one, so this fragment belongs to neither.
        let prev_ends = i == 0 || ends_sentence(lines[i - 1]);
        let next_caps = i + 1 >= lines.len() || starts_uppercase(lines[i + 1]);
        if prev_ends && next_caps {
            orphan_count += 1;
        }
    }

    let line_count = lines.len();
    let candidate_ratio = candidate_count as f32 / line_count.max(1) as f32;
    let detected = candidate_count >= MIN_CANDIDATES
        && orphan_count >= MIN_ORPHANS
        && candidate_ratio >= MIN_CANDIDATE_RATIO;

    FragmentationSignal {
        detected,
        candidate_count,
        orphan_count,
        candidate_ratio,
        line_count,
    }
}

/// Count row-fragment breaks: a line with no terminal punctuation followed
/// by a lowercase-start line, where the join would still read mid-sentence.
pub fn count_row_breaks(text: &str) -> usize {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    lines
        .windows(2)
        .filter(|w| !ends_sentence(w[0]) && !w[0].ends_with(':') && starts_lowercase(w[1]))
        .count()
}

/// Combine the five backfill signals into a vote.
///
/// `density_vs_floor` is native text density divided by the classifier's
/// bypass floor; values in `[0.4, 1.0)` read as "text present but thin".
pub fn backfill_vote(
    fragmentation: &FragmentationSignal,
    short_line_ratio: f32,
    row_break_count: usize,
    density_vs_floor: f32,
) -> BackfillVote {
    let signals = [
        (fragmentation.detected, VOTE_FRAGMENTATION),
        (fragmentation.orphan_count >= MIN_ORPHANS, VOTE_ORPHAN_LINES),
        (short_line_ratio >= SHORT_LINE_RATIO, VOTE_SHORT_LINES),
        (row_break_count >= MIN_ROW_BREAKS, VOTE_ROW_BREAKS),
        (
            (MESSY_DENSITY_LOW..1.0).contains(&density_vs_floor),
            VOTE_MESSY_DENSITY,
        ),
    ];

    let mut severity = 0.0f32;
    let mut votes = 0usize;
    let mut strong_votes = 0usize;
    for (fired, weight) in signals {
        if fired {
            severity += weight;
            votes += 1;
            if weight >= STRONG_VOTE_WEIGHT {
                strong_votes += 1;
            }
        }
    }

    let needed = fragmentation.line_count >= BACKFILL_MIN_LINES
        && severity >= BACKFILL_MIN_SEVERITY
        && (strong_votes >= 2 || votes >= 3);

    BackfillVote {
        needed,
        severity,
        votes,
        strong_votes,
    }
}

/// Fraction of non-empty lines shorter than [`SHORT_LINE_LEN`].
pub fn short_line_ratio(text: &str) -> f32 {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    if lines.is_empty() {
        return 0.0;
    }
    let short = lines
        .iter()
        .filter(|l| l.chars().count() < SHORT_LINE_LEN)
        .count();
    short as f32 / lines.len() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    const FRAGMENTED: &str = "The patient was brought to the operating suite.\n\
        into the right mainstem.\n\
        The scope was then withdrawn slowly.\n\
        without difficulty.\n\
        Hemostasis was confirmed at the site.\n\
        was tolerated well.\n\
        The patient was transferred to recovery.\n\
        no complications noted.\n\
        Vital signs remained stable throughout.\n\
        Final counts were correct.\n";

    const CLEAN: &str = "The patient was brought to the operating suite.\n\
        The bronchoscope was advanced into the right mainstem bronchus.\n\
        The airway was inspected and secretions were suctioned.\n\
        The patient tolerated the procedure well.\n";

    #[test]
    fn test_candidate_shape() {
        assert!(is_candidate("into the right mainstem."));
        assert!(is_candidate("was tolerated well."));
        assert!(!is_candidate("The patient was stable."));
        assert!(!is_candidate("into the right mainstem bronchus and then further down the airway."));
        assert!(!is_candidate("into the right mainstem without punctuation"));
    }

    #[test]
    fn test_fragmented_page_detected() {
        let signal = detect_fragmentation(FRAGMENTED);
        assert!(signal.candidate_count >= 3);
        assert!(signal.orphan_count >= 2);
        assert!(signal.detected);
    }

    #[test]
    fn test_clean_page_not_detected() {
        let signal = detect_fragmentation(CLEAN);
        assert!(!signal.detected);
    }

    #[test]
    fn test_empty_text() {
        let signal = detect_fragmentation("");
        assert!(!signal.detected);
        assert_eq!(signal.line_count, 0);
    }

    #[test]
    fn test_backfill_vote_fires_on_fragmented_page() {
        let signal = detect_fragmentation(FRAGMENTED);
        let vote = backfill_vote(&signal, short_line_ratio(FRAGMENTED), count_row_breaks(FRAGMENTED), 0.7);
        assert!(vote.needed);
        assert!(vote.severity >= BACKFILL_MIN_SEVERITY);
        assert!(vote.strong_votes >= 2);
    }

    #[test]
    fn test_backfill_vote_quiet_on_clean_page() {
        let signal = detect_fragmentation(CLEAN);
        let vote = backfill_vote(&signal, short_line_ratio(CLEAN), count_row_breaks(CLEAN), 2.0);
        assert!(!vote.needed);
    }

    #[test]
    fn test_backfill_needs_minimum_lines() {
        // Fragmented shape but too few lines to justify a pass
        let short_text = "into the right mainstem.\nwas tolerated well.\nno complications noted.\n";
        let signal = detect_fragmentation(short_text);
        let vote = backfill_vote(&signal, 1.0, 0, 0.7);
        assert!(!vote.needed);
    }

    #[test]
    fn test_row_breaks() {
        let text = "The incision was\ncarried down through\nthe subcutaneous tissue.";
        assert_eq!(count_row_breaks(text), 2);
    }
}
