//! Errors raised while processing a single document
//!
//! These errors are isolated to one document: the queue records them against
//! that document and carries on with the rest of the job.

use thiserror::Error;

use crate::document::DocumentRef;

/// Errors that can occur while processing one document
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcessingError {
    /// The document could not be read from its source
    #[error("Cannot read document {document}: {reason}")]
    ReadError { document: DocumentRef, reason: String },

    /// The document was read but is not valid text
    #[error("Cannot parse document {document}: {reason}")]
    ParseError { document: DocumentRef, reason: String },

    /// The broadcast bus refused the segment (it has been shut down)
    #[error("Cannot publish segments: {0}")]
    PublishError(String),
}

impl ProcessingError {
    /// Create a read error for a document
    pub fn read_error(document: &DocumentRef, reason: impl Into<String>) -> Self {
        Self::ReadError {
            document: document.clone(),
            reason: reason.into(),
        }
    }

    /// Create a parse error for a document
    pub fn parse_error(document: &DocumentRef, reason: impl Into<String>) -> Self {
        Self::ParseError {
            document: document.clone(),
            reason: reason.into(),
        }
    }

    /// Machine-readable error kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ReadError { .. } => "read_error",
            Self::ParseError { .. } => "parse_error",
            Self::PublishError(_) => "publish_error",
        }
    }
}

/// Error returned by a `SegmentPublisher` that can no longer publish
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PublishError {
    #[error("Broadcast bus is closed")]
    Closed,

    /// The bus refused this particular segment (e.g. it exceeds the frame limit)
    #[error("Broadcast bus rejected the segment: {0}")]
    Rejected(String),
}

impl From<PublishError> for ProcessingError {
    fn from(err: PublishError) -> Self {
        Self::PublishError(err.to_string())
    }
}
