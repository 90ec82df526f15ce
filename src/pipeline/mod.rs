//! Per-document pipeline: sequence layout, classification, recognition,
//! and fusion for each page, then aggregate a document-level safety gate.

pub mod events;
pub mod render;

pub use events::{Event, EventSink, NullSink, PipelineStage, VecSink};
pub use render::{PageContent, PageRenderer};

use crate::assembler::{self, AssembleOptions, FlaggedSpan};
use crate::cancel::CancelToken;
use crate::classify::{self, Classification, PageStats};
use crate::config::ExtractionConfig;
use crate::contamination;
use crate::error::{Error, Result};
use crate::fusion::{arbitrate_page_text, SourceDecision};
use crate::layout::PageLayout;
use crate::ocr::{EngineProvider, OcrPageOutput, OcrSession, Orchestrator, RegionPlanner};

/// Low scale used for the mask-classification raster sample.
const MASK_SAMPLE_SCALE: f32 = 0.5;

/// Explicit per-page source override supplied by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum SourceOverride {
    /// Use the native text layer only.
    ForceNative,
    /// Run full-page recognition regardless of classification.
    ForceOcr,
}

/// A per-page hint from the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageHint {
    /// Zero-based page index the hint applies to.
    pub page: usize,
    /// The override.
    pub source: SourceOverride,
}

/// An extraction request: which pages, with which hints.
#[derive(Debug, Clone, Default)]
pub struct ExtractionRequest {
    /// Pages to process; `None` means all pages, in order. Out-of-range
    /// indices are skipped with a warning.
    pub page_indexes: Option<Vec<usize>>,
    /// Per-page source overrides.
    pub hints: Vec<PageHint>,
}

impl ExtractionRequest {
    /// Request for specific pages, for targeted re-extraction.
    pub fn for_pages(pages: Vec<usize>) -> Self {
        Self {
            page_indexes: Some(pages),
            hints: Vec::new(),
        }
    }

    fn hint_for(&self, page: usize) -> Option<SourceOverride> {
        self.hints.iter().find(|h| h.page == page).map(|h| h.source)
    }
}

/// Gate verdict status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateStatus {
    /// Every page produced trustworthy text.
    Pass,
    /// At least one page is blocked.
    Blocked,
}

/// Document-level safety verdict.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Gate {
    /// Pass or blocked.
    pub status: GateStatus,
    /// Human-readable reason naming the blocking page, when blocked.
    pub reason: Option<String>,
}

/// Per-page recognition quality diagnostics.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct PageQuality {
    /// Mean OCR line confidence, when recognition ran.
    pub ocr_mean_line_confidence: Option<f32>,
    /// Recognition passes run on the page.
    pub ocr_passes: usize,
    /// Passes that failed after their retry.
    pub failed_passes: usize,
    /// Junk score removed by figure suppression.
    pub junk_delta: f32,
    /// Fraction of the page covered by recognition regions.
    pub roi_coverage: f32,
    /// Fragments repaired during fusion.
    pub repaired_fragments: usize,
}

/// Result for one page.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct PageResult {
    /// Zero-based page index.
    pub page_index: usize,
    /// Final page text.
    pub text: String,
    /// Unfiltered native text for the same rows.
    pub raw_text: String,
    /// Retained-but-suspect spans in the native text.
    pub flagged_spans: Vec<FlaggedSpan>,
    /// Page statistics.
    pub stats: PageStats,
    /// Classifier decision.
    pub classification: Classification,
    /// Which source produced `text`.
    pub source: SourceDecision,
    /// Why the arbitration chose that source.
    pub source_reason: String,
    /// Confidence in the page text, `[0, 1]`.
    pub confidence: f32,
    /// Recognition diagnostics.
    pub quality: PageQuality,
    /// Why the page is blocked, when it is.
    pub blocked_reason: Option<String>,
}

/// Document-level quality summary.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct QualitySummary {
    /// Mean page confidence.
    pub mean_confidence: f32,
    /// Pages whose text used recognition (ocr or hybrid).
    pub ocr_pages: usize,
    /// Pages over the contamination threshold.
    pub contaminated_pages: usize,
    /// Blocked pages.
    pub blocked_pages: usize,
}

/// The assembled document: ordered pages, concatenated text, gate verdict.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DocumentModel {
    /// Ordered page results.
    pub pages: Vec<PageResult>,
    /// Concatenated text with per-page headers.
    pub text: String,
    /// Whether any page needed recognition.
    pub requires_ocr: bool,
    /// Safety verdict.
    pub gate: Gate,
    /// Quality summary.
    pub quality: QualitySummary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OcrMode {
    None,
    Full,
    Backfill,
}

impl OcrMode {
    fn label(&self) -> &'static str {
        match self {
            OcrMode::None => "native",
            OcrMode::Full => "full",
            OcrMode::Backfill => "backfill",
        }
    }
}

/// A pipeline session owning configuration and the recognition session.
///
/// All previously process-wide state (active job id, cached engine handle)
/// lives here explicitly.
pub struct Session {
    config: ExtractionConfig,
    ocr: Option<OcrSession>,
}

impl Session {
    /// Create a session, validating the configuration once.
    pub fn new(config: ExtractionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, ocr: None })
    }

    /// Attach a recognition engine provider.
    ///
    /// Without one, the pipeline degrades to native-only decisions and
    /// blocks pages that require recognition.
    pub fn with_engine_provider(mut self, provider: Box<dyn EngineProvider>) -> Self {
        self.ocr = Some(OcrSession::new(provider));
        self
    }

    /// The active configuration.
    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Process a document.
    ///
    /// Emits stage/progress events before each page's result event, page
    /// results in index order, and exactly one terminal event: `Done`,
    /// `Error`, or `Cancelled`.
    pub fn process(
        &mut self,
        renderer: &mut dyn PageRenderer,
        request: &ExtractionRequest,
        sink: &mut dyn EventSink,
        cancel: &CancelToken,
    ) -> Result<DocumentModel> {
        let page_count = renderer.page_count();
        let indexes: Vec<usize> = match &request.page_indexes {
            Some(pages) => {
                let (valid, invalid): (Vec<usize>, Vec<usize>) =
                    pages.iter().copied().partition(|p| *p < page_count);
                for p in invalid {
                    log::warn!("requested page {p} out of range ({page_count} pages), skipping");
                }
                let mut valid = valid;
                valid.sort_unstable();
                valid.dedup();
                valid
            }
            None => (0..page_count).collect(),
        };

        let total = indexes.len();
        let mut pages: Vec<PageResult> = Vec::with_capacity(total);

        for (done, &page) in indexes.iter().enumerate() {
            if cancel.is_cancelled() {
                sink.emit(Event::Cancelled { job: cancel.job() });
                return Err(Error::Cancelled(cancel.job()));
            }

            match self.process_page(renderer, request, sink, cancel, page) {
                Ok(result) => {
                    sink.emit(Event::Progress {
                        completed: done + 1,
                        total,
                    });
                    sink.emit(Event::Page(Box::new(result.clone())));
                    pages.push(result);
                }
                Err(e) if e.is_fatal() => {
                    sink.emit(Event::Error {
                        message: e.to_string(),
                    });
                    return Err(e);
                }
                Err(e) => {
                    if let Error::Cancelled(job) = e {
                        sink.emit(Event::Cancelled { job });
                        return Err(e);
                    }
                    // Non-fatal page failure: record an empty blocked page.
                    log::warn!("page {page} failed: {e}");
                    let result = blocked_page(page, format!("page {page} failed: {e}"));
                    sink.emit(Event::Progress {
                        completed: done + 1,
                        total,
                    });
                    sink.emit(Event::Page(Box::new(result.clone())));
                    pages.push(result);
                }
            }
        }

        let model = finish_document(pages, &self.config);
        sink.emit(Event::Done {
            pages: model.pages.len(),
        });
        Ok(model)
    }

    fn process_page(
        &mut self,
        renderer: &mut dyn PageRenderer,
        request: &ExtractionRequest,
        sink: &mut dyn EventSink,
        cancel: &CancelToken,
        page: usize,
    ) -> Result<PageResult> {
        sink.emit(Event::Stage {
            page,
            stage: PipelineStage::Layout,
        });

        let content = match renderer.page_content(page) {
            Ok(content) => content,
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                log::warn!("page {page}: content extraction failed ({e}), native-only fallback");
                PageContent::default()
            }
        };

        let bounds = content.bounds.normalize();
        let layout = PageLayout::analyze(&content.items);
        let text_regions = layout.text_regions();
        let contamination = contamination::detect(
            &content.items,
            &content.image_regions,
            &bounds,
            self.config.mask.margin,
            contamination::DEFAULT_MIN_OVERLAP_RATIO,
        );
        let assembled = assembler::assemble(
            &layout,
            &contamination,
            AssembleOptions {
                filter_contaminated: self.config.filter_contaminated,
            },
        );
        let stats = PageStats::compute(
            &content.items,
            &content.image_regions,
            &bounds,
            &text_regions,
            &contamination,
            &assembled,
        );

        sink.emit(Event::Stage {
            page,
            stage: PipelineStage::Classify,
        });
        let classification = classify::classify(&stats, &assembled.text);

        // Resolve the requested source: explicit override > force-OCR-all >
        // backfill-native > classifier.
        let mode = match request.hint_for(page) {
            Some(SourceOverride::ForceNative) => OcrMode::None,
            Some(SourceOverride::ForceOcr) => OcrMode::Full,
            None if self.config.force_ocr_all => OcrMode::Full,
            None if classification.needs_ocr_backfill => OcrMode::Backfill,
            None if classification.needs_ocr => OcrMode::Full,
            None => OcrMode::None,
        };

        let mut quality = PageQuality::default();
        let ocr_output = match mode {
            OcrMode::None => None,
            _ if self.ocr.is_none() => None,
            OcrMode::Full => {
                sink.emit(Event::Stage {
                    page,
                    stage: PipelineStage::Recognize,
                });
                self.run_full_page(
                    renderer, cancel, page, &bounds, &layout, &content, &stats, &mut quality,
                )?
            }
            OcrMode::Backfill => {
                sink.emit(Event::Stage {
                    page,
                    stage: PipelineStage::Recognize,
                });
                self.run_backfill(renderer, cancel, page, &bounds, &layout, &mut quality)?
            }
        };

        sink.emit(Event::Stage {
            page,
            stage: PipelineStage::Fuse,
        });
        let fusion = arbitrate_page_text(
            &assembled.text,
            ocr_output.as_ref(),
            &classification,
            stats.contamination_score,
            stats.completeness_confidence,
        );
        quality.repaired_fragments = fusion.repaired_fragments;

        // Safety evaluation: a page is unsafe when the classifier wants OCR
        // or the contamination/completeness thresholds are breached.
        let unsafe_page = classification.needs_ocr
            || stats.contamination_score >= self.config.gate.max_contamination_score
            || stats.completeness_confidence < self.config.gate.min_completeness_confidence;

        let ocr_ran = ocr_output.is_some();
        let blocked_reason = if fusion.blocked {
            Some(format!("page {page}: {}", fusion.reason))
        } else if unsafe_page && !ocr_ran && self.ocr.is_none() {
            Some(format!(
                "page {page}: unsafe native text and recognition unavailable"
            ))
        } else {
            None
        };

        log::info!(
            "page {page}: mode={} density={:.5} backfill_votes={}/{} severity={:.2} roi={:.2} junk_delta={:+.3} conf={:.2} source={:?}",
            mode.label(),
            stats.native_text_density,
            classification.backfill.votes,
            classification.backfill.strong_votes,
            classification.severity,
            quality.roi_coverage,
            quality.junk_delta,
            fusion.confidence,
            fusion.source,
        );

        Ok(PageResult {
            page_index: page,
            text: fusion.text,
            raw_text: assembled.raw_text,
            flagged_spans: assembled.flagged_spans,
            stats,
            classification,
            source: fusion.source,
            source_reason: fusion.reason,
            confidence: fusion.confidence,
            quality,
            blocked_reason,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn run_full_page(
        &mut self,
        renderer: &mut dyn PageRenderer,
        cancel: &CancelToken,
        page: usize,
        bounds: &crate::geometry::Rect,
        layout: &PageLayout,
        content: &PageContent,
        stats: &PageStats,
        quality: &mut PageQuality,
    ) -> Result<Option<OcrPageOutput>> {
        let planner = RegionPlanner::new(&self.config);
        let text_regions = layout.text_regions();
        let crop = planner.plan_crop(&text_regions, &content.image_regions, bounds);

        let masks = match renderer.render_page(page, MASK_SAMPLE_SCALE) {
            Ok(raster) => {
                planner.plan_masks(&content.image_regions, bounds, &raster, stats.char_count)
            }
            Err(e) => {
                log::warn!("page {page}: mask raster render failed ({e}), skipping masks");
                Default::default()
            }
        };
        let header = planner.plan_header(&text_regions, bounds);

        let roi = crop.unwrap_or(*bounds);
        quality.roi_coverage = (roi.area() / bounds.area().max(1.0)).min(1.0);

        let session = match self.ocr.as_mut() {
            Some(session) => session,
            None => return Ok(None),
        };
        let engine = match session.engine(&self.config.language) {
            Ok(engine) => engine,
            Err(e) => {
                log::warn!("page {page}: {e}");
                return Ok(None);
            }
        };

        let mut render = |region: Option<crate::geometry::Rect>, scale: f32| {
            renderer.render_region(page, region.unwrap_or(*bounds), scale)
        };
        let mut orchestrator = Orchestrator::new(engine, &self.config, page, cancel.clone());
        match orchestrator.recognize_full_page(&mut render, bounds, crop, &masks, &header) {
            Ok(output) => {
                quality.ocr_passes = output.passes;
                quality.failed_passes = output.failed_passes;
                quality.junk_delta = output.junk_delta;
                quality.ocr_mean_line_confidence = output
                    .has_content()
                    .then_some(output.metrics.mean_line_confidence);
                Ok(Some(output))
            }
            Err(e @ Error::Cancelled(_)) => Err(e),
            Err(e) => {
                log::warn!("page {page}: full-page recognition failed: {e}");
                Ok(None)
            }
        }
    }

    fn run_backfill(
        &mut self,
        renderer: &mut dyn PageRenderer,
        cancel: &CancelToken,
        page: usize,
        bounds: &crate::geometry::Rect,
        layout: &PageLayout,
        quality: &mut PageQuality,
    ) -> Result<Option<OcrPageOutput>> {
        let planner = RegionPlanner::new(&self.config);

        // Target the lines whose assembled text has the fragment shape.
        let targets: Vec<crate::geometry::Rect> = layout
            .lines
            .iter()
            .filter(|l| classify::fragmentation::is_fragment_candidate(&l.text()))
            .map(|l| l.bbox)
            .collect();
        if targets.is_empty() {
            log::debug!("page {page}: backfill requested but no target lines");
            return Ok(None);
        }
        let bands = planner.plan_line_bands(&targets, bounds);
        quality.roi_coverage = (bands.iter().map(|b| b.area()).sum::<f32>()
            / bounds.area().max(1.0))
        .min(1.0);

        let session = match self.ocr.as_mut() {
            Some(session) => session,
            None => return Ok(None),
        };
        let engine = match session.engine(&self.config.language) {
            Ok(engine) => engine,
            Err(e) => {
                log::warn!("page {page}: {e}");
                return Ok(None);
            }
        };

        let mut render = |region: Option<crate::geometry::Rect>, scale: f32| {
            renderer.render_region(page, region.unwrap_or(*bounds), scale)
        };
        let mut orchestrator = Orchestrator::new(engine, &self.config, page, cancel.clone());
        match orchestrator.recognize_backfill(&mut render, &bands) {
            Ok(output) => {
                quality.ocr_passes = output.passes;
                quality.failed_passes = output.failed_passes;
                quality.ocr_mean_line_confidence = output
                    .has_content()
                    .then_some(output.metrics.mean_line_confidence);
                Ok(Some(output))
            }
            Err(e @ Error::Cancelled(_)) => Err(e),
            Err(e) => {
                log::warn!("page {page}: backfill recognition failed: {e}");
                Ok(None)
            }
        }
    }
}

fn blocked_page(page: usize, reason: String) -> PageResult {
    PageResult {
        page_index: page,
        text: String::new(),
        raw_text: String::new(),
        flagged_spans: Vec::new(),
        stats: PageStats::default(),
        classification: Classification::default(),
        source: SourceDecision::Native,
        source_reason: reason.clone(),
        confidence: 0.0,
        quality: PageQuality::default(),
        blocked_reason: Some(reason),
    }
}

fn finish_document(pages: Vec<PageResult>, config: &ExtractionConfig) -> DocumentModel {
    let blocked = pages
        .iter()
        .find(|p| p.blocked_reason.is_some())
        .map(|p| {
            p.blocked_reason
                .clone()
                .unwrap_or_else(|| format!("page {} blocked", p.page_index))
        });

    let requires_ocr = pages.iter().any(|p| {
        p.source != SourceDecision::Native
            || p.classification.needs_ocr
            || p.classification.needs_ocr_backfill
    });

    let text = pages
        .iter()
        .map(|p| format!("--- Page {} ---\n{}", p.page_index + 1, p.text))
        .collect::<Vec<_>>()
        .join("\n\n");

    let blocked_pages = pages.iter().filter(|p| p.blocked_reason.is_some()).count();
    let quality = QualitySummary {
        mean_confidence: if pages.is_empty() {
            0.0
        } else {
            pages.iter().map(|p| p.confidence).sum::<f32>() / pages.len() as f32
        },
        ocr_pages: pages
            .iter()
            .filter(|p| p.source != SourceDecision::Native)
            .count(),
        contaminated_pages: pages
            .iter()
            .filter(|p| p.stats.contamination_score >= config.gate.max_contamination_score)
            .count(),
        blocked_pages,
    };

    let gate = match blocked {
        Some(reason) => Gate {
            status: GateStatus::Blocked,
            reason: Some(reason),
        },
        None => Gate {
            status: GateStatus::Pass,
            reason: None,
        },
    };

    DocumentModel {
        pages,
        text,
        requires_ocr,
        gate,
        quality,
    }
}
