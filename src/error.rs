//! Error types for the extraction engine.
//!
//! This module defines all error types that can occur while analyzing a
//! document and arbitrating between native and recognized text.

/// Result type alias for extraction operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur during document text extraction.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed input document. Fatal: aborts the whole job.
    #[error("Malformed document: {0}")]
    Document(String),

    /// A page could not be rendered or its content stream read.
    /// Non-fatal: the page falls back to native-only text.
    #[error("Failed to render page {page}: {reason}")]
    Render {
        /// Zero-based page index
        page: usize,
        /// Reason for the render failure
        reason: String,
    },

    /// The recognition engine could not be loaded or initialized.
    /// Non-fatal: the pipeline degrades to native-only decisions.
    #[error("Recognition engine unavailable: {0}")]
    EngineUnavailable(String),

    /// A single recognition pass failed.
    #[error("Recognition pass failed on page {page}: {reason}")]
    Recognition {
        /// Zero-based page index
        page: usize,
        /// Reason for the pass failure
        reason: String,
    },

    /// Invalid configuration detected at pipeline construction.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The job was cancelled cooperatively.
    #[error("Job {0} cancelled")]
    Cancelled(u64),

    /// IO error from a collaborator boundary.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image buffer error during preprocessing.
    #[error("Image error: {0}")]
    Image(String),
}

impl Error {
    /// Whether this error aborts the whole job.
    ///
    /// Only malformed-document and configuration errors are fatal; render
    /// and recognition failures degrade per page or per pass.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Document(_) | Error::InvalidConfig(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_error_message() {
        let err = Error::Document("truncated xref".to_string());
        let msg = format!("{}", err);
        assert!(msg.contains("Malformed document"));
        assert!(msg.contains("truncated xref"));
    }

    #[test]
    fn test_render_error_names_page() {
        let err = Error::Render {
            page: 3,
            reason: "context lost".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains('3'));
        assert!(msg.contains("context lost"));
    }

    #[test]
    fn test_fatal_split() {
        assert!(Error::Document("bad".into()).is_fatal());
        assert!(Error::InvalidConfig("bad".into()).is_fatal());
        assert!(!Error::EngineUnavailable("no model".into()).is_fatal());
        assert!(!Error::Recognition {
            page: 0,
            reason: "oom".into()
        }
        .is_fatal());
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    }
}
