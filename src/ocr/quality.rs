//! Pass quality metrics and the weighted pass score used to pick between
//! competing recognition passes.

use crate::ocr::OcrLine;

// Pass-score weights. Empirically tuned; kept verbatim.
const W_CHARS: f32 = 0.3;
const W_ALPHA: f32 = 0.17;
const W_LINE_CONF: f32 = 0.17;
const W_WORD_CONF: f32 = 0.14;
const W_LINE_COUNT: f32 = 0.1;
const W_JUNK: f32 = 0.17;
const W_LOW_CONF_LINES: f32 = 0.11;
const W_LOW_CONF_WORDS: f32 = 0.08;

/// Character count at which the char score saturates.
const CHAR_SCORE_CEILING: f32 = 900.0;

/// Line count at which the line-count score saturates.
const LINE_COUNT_CEILING: f32 = 40.0;

// Weak-pass thresholds: any one of these marks a pass as weak.
const WEAK_MIN_CHARS: usize = 120;
const WEAK_MIN_ALPHA: f32 = 0.5;
const WEAK_MIN_LINE_CONF: f32 = 65.0;
const WEAK_MAX_LOW_CONF_LINES: f32 = 0.35;
const WEAK_MAX_JUNK: f32 = 0.25;

/// Quality metrics for one recognition pass.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PassMetrics {
    /// Non-whitespace characters recognized.
    pub char_count: usize,
    /// Alphabetic fraction of non-whitespace characters.
    pub alpha_ratio: f32,
    /// Mean line confidence, 0–100 (0 when unreported).
    pub mean_line_confidence: f32,
    /// Mean word confidence, 0–100 (0 when unreported).
    pub mean_word_confidence: f32,
    /// Fraction of lines below the low-confidence threshold.
    pub low_conf_line_ratio: f32,
    /// Fraction of words below the low-confidence threshold.
    pub low_conf_word_ratio: f32,
    /// Recognized lines.
    pub line_count: usize,
    /// Fraction of tokens that read as junk.
    pub junk_score: f32,
}

impl PassMetrics {
    /// Measure a pass result.
    ///
    /// `low_conf_threshold` is the 0–100 confidence below which a line or
    /// word counts as low-confidence.
    pub fn measure(lines: &[OcrLine], low_conf_threshold: f32) -> Self {
        let text: String = lines.iter().map(|l| l.text.as_str()).collect::<Vec<_>>().join("\n");
        let chars: Vec<char> = text.chars().filter(|c| !c.is_whitespace()).collect();
        let char_count = chars.len();
        let alpha = chars.iter().filter(|c| c.is_alphabetic()).count();
        let alpha_ratio = alpha as f32 / char_count.max(1) as f32;

        let confidences: Vec<f32> = lines.iter().filter_map(|l| l.confidence).collect();
        let mean_line_confidence = mean(&confidences);
        let low_conf_lines = confidences.iter().filter(|c| **c < low_conf_threshold).count();
        let low_conf_line_ratio = low_conf_lines as f32 / confidences.len().max(1) as f32;

        let word_confs: Vec<f32> = lines
            .iter()
            .flat_map(|l| l.words.iter())
            .filter_map(|w| w.confidence)
            .collect();
        let mean_word_confidence = mean(&word_confs);
        let low_conf_words = word_confs.iter().filter(|c| **c < low_conf_threshold).count();
        let low_conf_word_ratio = low_conf_words as f32 / word_confs.len().max(1) as f32;

        let tokens: Vec<&str> = text.split_whitespace().collect();
        let junk = tokens.iter().filter(|t| is_junk_token(t)).count();
        let junk_score = junk as f32 / tokens.len().max(1) as f32;

        Self {
            char_count,
            alpha_ratio,
            mean_line_confidence,
            mean_word_confidence,
            low_conf_line_ratio,
            low_conf_word_ratio,
            line_count: lines.len(),
            junk_score,
        }
    }

    /// Whether the pass is weak enough to justify fallback passes.
    pub fn is_weak(&self) -> bool {
        self.char_count < WEAK_MIN_CHARS
            || self.alpha_ratio < WEAK_MIN_ALPHA
            || self.mean_line_confidence < WEAK_MIN_LINE_CONF
            || self.low_conf_line_ratio > WEAK_MAX_LOW_CONF_LINES
            || self.junk_score > WEAK_MAX_JUNK
    }
}

fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f32>() / values.len() as f32
    }
}

/// A token with less than half alphanumeric content reads as junk.
fn is_junk_token(token: &str) -> bool {
    let total = token.chars().count();
    if total == 0 {
        return true;
    }
    let alnum = token.chars().filter(|c| c.is_alphanumeric()).count();
    (alnum as f32 / total as f32) < 0.5
}

/// Weighted score over pass metrics; higher is better.
pub fn pass_score(m: &PassMetrics) -> f32 {
    let char_score = (m.char_count as f32 / CHAR_SCORE_CEILING).min(1.0);
    let line_count_score = (m.line_count as f32 / LINE_COUNT_CEILING).min(1.0);

    W_CHARS * char_score
        + W_ALPHA * m.alpha_ratio
        + W_LINE_CONF * m.mean_line_confidence / 100.0
        + W_WORD_CONF * m.mean_word_confidence / 100.0
        + W_LINE_COUNT * line_count_score
        - W_JUNK * m.junk_score
        - W_LOW_CONF_LINES * m.low_conf_line_ratio
        - W_LOW_CONF_WORDS * m.low_conf_word_ratio
}
