//! OCR collaboration layer: recognition-engine contract, session handling,
//! region planning, preprocessing, and pass orchestration.
//!
//! The recognition model itself lives behind [`RecognitionEngine`]; this
//! crate only decides what to recognize, how to prepare the pixels, and
//! which pass to trust.

pub mod orchestrator;
pub mod planner;
pub mod preprocess;
pub mod quality;

pub use orchestrator::{OcrPageOutput, Orchestrator, RegionRender};
pub use planner::{HeaderPlan, MaskPlan, RegionPlanner};
pub use quality::{pass_score, PassMetrics};

use image::GrayImage;

use crate::error::{Error, Result};
use crate::geometry::Rect;
use crate::utils::safe_float_cmp;

/// Page segmentation hint passed to the recognition engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum PageSegMode {
    /// Automatic layout detection.
    Auto,
    /// Treat the image as one uniform text block.
    SingleBlock,
    /// Treat the image as one column of variable-size text.
    SingleColumn,
    /// Find sparse text with no particular layout.
    SparseText,
}

/// A recognized word with optional confidence.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OcrWord {
    /// Word text.
    pub text: String,
    /// Confidence 0–100, when the engine reports one.
    pub confidence: Option<f32>,
    /// Bounding box in the recognized image's coordinates.
    pub bbox: Rect,
}

/// A recognized text line.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OcrLine {
    /// Line text.
    pub text: String,
    /// Confidence 0–100, when the engine reports one.
    pub confidence: Option<f32>,
    /// Bounding box in the recognized image's coordinates.
    pub bbox: Rect,
    /// Word-level detail.
    pub words: Vec<OcrWord>,
    /// Zone the line came from, for multi-zone passes.
    pub zone_id: Option<usize>,
    /// Recognition order of the zone.
    pub zone_order: Option<usize>,
}

impl OcrLine {
    /// Create a line, coercing out-of-range confidence to the valid band
    /// and normalizing the box.
    pub fn new(text: impl Into<String>, confidence: Option<f32>, bbox: Rect) -> Self {
        Self {
            text: text.into(),
            confidence: confidence.map(clamp_confidence),
            bbox: bbox.normalize(),
            words: Vec::new(),
            zone_id: None,
            zone_order: None,
        }
    }

    /// Attach word detail, coercing confidences.
    pub fn with_words(mut self, words: Vec<OcrWord>) -> Self {
        self.words = words
            .into_iter()
            .map(|w| OcrWord {
                confidence: w.confidence.map(clamp_confidence),
                bbox: w.bbox.normalize(),
                ..w
            })
            .collect();
        self
    }
}

/// Coerce a reported confidence into 0–100; NaN becomes 0.
fn clamp_confidence(c: f32) -> f32 {
    if c.is_finite() {
        c.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

/// Sort recognized lines into reading order: top-to-bottom, with a
/// left-to-right tie-break for lines on the same band.
pub fn sort_reading_order(lines: &mut [OcrLine]) {
    lines.sort_by(|a, b| {
        if (a.bbox.y - b.bbox.y).abs() < 10.0 {
            safe_float_cmp(a.bbox.x, b.bbox.x)
        } else {
            safe_float_cmp(a.bbox.y, b.bbox.y)
        }
    });
}

/// Join lines into text, one per row.
pub fn lines_to_text(lines: &[OcrLine]) -> String {
    lines
        .iter()
        .map(|l| l.text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// The recognition collaborator.
///
/// Implementations wrap an actual OCR engine (Tesseract, an ONNX pipeline,
/// a remote service). The engine accepts a grayscale buffer and a
/// segmentation hint, and returns positioned lines with optional 0–100
/// confidence.
pub trait RecognitionEngine {
    /// Recognize text in a grayscale image.
    fn recognize(&mut self, image: &GrayImage, mode: PageSegMode) -> Result<Vec<OcrLine>>;

    /// Recognize from an encoded PNG buffer.
    ///
    /// Used as the alternate input encoding when a raw-buffer pass fails.
    /// The default implementation decodes and delegates to [`Self::recognize`].
    fn recognize_encoded(&mut self, png: &[u8], mode: PageSegMode) -> Result<Vec<OcrLine>> {
        let decoded = image::load_from_memory(png)
            .map_err(|e| Error::Image(format!("failed to decode retry buffer: {e}")))?;
        self.recognize(&decoded.to_luma8(), mode)
    }
}

/// Loads recognition engines for a language tag.
pub trait EngineProvider {
    /// Load (or connect to) an engine configured for `language`.
    fn load(&self, language: &str) -> Result<Box<dyn RecognitionEngine>>;
}

/// Reusable engine session keyed by recognition language.
///
/// The engine handle is the only state that survives across pages; it is
/// re-created only when the language configuration changes.
pub struct OcrSession {
    provider: Box<dyn EngineProvider>,
    cached: Option<(String, Box<dyn RecognitionEngine>)>,
}

impl OcrSession {
    /// Create a session around an engine provider.
    pub fn new(provider: Box<dyn EngineProvider>) -> Self {
        Self {
            provider,
            cached: None,
        }
    }

    /// Get the engine for `language`, reusing the cached handle when the
    /// language matches.
    pub fn engine(&mut self, language: &str) -> Result<&mut dyn RecognitionEngine> {
        let stale = match &self.cached {
            Some((lang, _)) => lang != language,
            None => true,
        };
        if stale {
            log::debug!("loading recognition engine for language '{language}'");
            let engine = self.provider.load(language)?;
            self.cached = Some((language.to_string(), engine));
        }
        match self.cached.as_mut() {
            Some((_, engine)) => Ok(engine.as_mut()),
            None => Err(Error::EngineUnavailable("session cache empty".to_string())),
        }
    }
}
