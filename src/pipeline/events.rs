//! Typed, ordered event stream for pipeline progress.
//!
//! Ordering guarantees: stage and progress events for a page are emitted
//! before that page's result event, and result events arrive in page-index
//! order. A cancelled job emits a cancellation notice and never a `Done`.

use crate::pipeline::PageResult;

/// Processing stage within one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// Layout analysis and contamination scoring.
    Layout,
    /// Page classification.
    Classify,
    /// Recognition passes.
    Recognize,
    /// Native/OCR fusion.
    Fuse,
}

/// One event in the pipeline's ordered stream.
#[derive(Debug, Clone)]
pub enum Event {
    /// A page entered a stage.
    Stage {
        /// Zero-based page index.
        page: usize,
        /// The stage entered.
        stage: PipelineStage,
    },
    /// Pages completed so far.
    Progress {
        /// Completed page count.
        completed: usize,
        /// Total pages in the job.
        total: usize,
    },
    /// A page finished; results arrive in page-index order.
    Page(Box<PageResult>),
    /// The whole job finished.
    Done {
        /// Pages processed.
        pages: usize,
    },
    /// The job aborted with a fatal error.
    Error {
        /// Human-readable description.
        message: String,
    },
    /// The job was cancelled; no `Done` follows.
    Cancelled {
        /// The cancelled job's identifier.
        job: u64,
    },
}

/// Consumes pipeline events in order.
pub trait EventSink {
    /// Receive the next event.
    fn emit(&mut self, event: Event);
}

/// Sink that discards every event.
#[derive(Debug, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&mut self, _event: Event) {}
}

/// Sink that collects events into a vector, preserving order.
#[derive(Debug, Default)]
pub struct VecSink {
    /// Collected events in arrival order.
    pub events: Vec<Event>,
}

impl EventSink for VecSink {
    fn emit(&mut self, event: Event) {
        self.events.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec_sink_preserves_order() {
        let mut sink = VecSink::default();
        sink.emit(Event::Stage {
            page: 0,
            stage: PipelineStage::Layout,
        });
        sink.emit(Event::Done { pages: 1 });
        assert_eq!(sink.events.len(), 2);
        assert!(matches!(sink.events[0], Event::Stage { page: 0, .. }));
        assert!(matches!(sink.events[1], Event::Done { pages: 1 }));
    }

    #[test]
    fn test_stage_serialization() {
        let json = serde_json::to_string(&PipelineStage::Recognize).unwrap();
        assert_eq!(json, "\"recognize\"");
    }
}
