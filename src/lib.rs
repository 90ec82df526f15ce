//! # text_triage
//!
//! Adaptive text extraction from scanned and digitally-authored documents.
//!
//! A document's embedded text layer may be absent, fragmented, or
//! contaminated by overlapping imagery. This crate decides, per page,
//! whether to trust the embedded text, replace it with optical recognition,
//! or fuse both — and emits a document-level pass/blocked safety verdict so
//! downstream consumers never receive text silently known to be unsafe.
//!
//! ## Pipeline
//!
//! 1. **Layout analysis** — cluster positioned glyph runs into lines,
//!    segments, and blocks ([`layout`]).
//! 2. **Contamination scoring** — overlap between text and image regions
//!    ([`contamination`]).
//! 3. **Text assembly** — reading-order text with artifact filtering and
//!    label/value pairing ([`assembler`]).
//! 4. **Page classification** — multi-signal `needs_ocr` / backfill
//!    decision ([`classify`]).
//! 5. **Region planning & recognition** — crop/mask/header/band planning
//!    and quality-scored passes ([`ocr`]).
//! 6. **Fusion** — native/OCR arbitration with section merge and fragment
//!    repair ([`fusion`]).
//! 7. **Pipeline & gate** — per-document orchestration and the safety
//!    verdict ([`pipeline`]).
//!
//! ## Quick start
//!
//! ```ignore
//! use text_triage::cancel::CancelToken;
//! use text_triage::config::ExtractionConfig;
//! use text_triage::pipeline::{ExtractionRequest, Session, VecSink};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut session = Session::new(ExtractionConfig::default())?
//!     .with_engine_provider(Box::new(my_engine_provider));
//!
//! let (token, _handle) = CancelToken::new(1);
//! let mut sink = VecSink::default();
//! let model = session.process(&mut my_renderer, &ExtractionRequest::default(), &mut sink, &token)?;
//!
//! println!("gate: {:?}", model.gate.status);
//! # Ok(())
//! # }
//! ```
//!
//! The rendering layer and the recognition engine are collaborators behind
//! the [`pipeline::PageRenderer`] and [`ocr::RecognitionEngine`] traits;
//! this crate performs no parsing, model inference, or I/O of its own.

#![warn(missing_docs)]

// Error handling
pub mod error;

// Cooperative cancellation
pub mod cancel;

// Configuration
pub mod config;

// Geometry kernel
pub mod geometry;

// Layout analysis
pub mod layout;

// Contamination scoring
pub mod contamination;

// Reading-order text assembly
pub mod assembler;

// Page classification
pub mod classify;

// OCR planning and orchestration
pub mod ocr;

// Native/OCR fusion and repair
pub mod fusion;

// Per-document pipeline and gate
pub mod pipeline;

// Re-exports
pub use cancel::{CancelHandle, CancelToken};
pub use classify::{Classification, PageStats, QualityFlag};
pub use config::{ExtractionConfig, QualityMode};
pub use error::{Error, Result};
pub use fusion::SourceDecision;
pub use pipeline::{DocumentModel, ExtractionRequest, Gate, GateStatus, PageResult, Session};

// Internal utilities
pub(crate) mod utils {
    //! Internal utility functions.

    use std::cmp::Ordering;

    /// Safely compare two floating point numbers, handling NaN cases.
    ///
    /// NaN values are treated as equal to each other and greater than all
    /// other values, so sorting never panics on imperfect upstream
    /// coordinates.
    #[inline]
    pub fn safe_float_cmp(a: f32, b: f32) -> Ordering {
        match (a.is_nan(), b.is_nan()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        }
    }

}

// Version info
/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
