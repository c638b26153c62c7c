//! Errors for the Worker Queue

use thiserror::Error;

/// Outcome of a failed call from the queue into one processor
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// The processor could not be reached, timed out, or failed on its side.
    /// The document goes back to pending and may be retried elsewhere.
    #[error("Processor unavailable: {0}")]
    Unavailable(String),

    /// The processor rejected the document itself (read or parse error).
    /// Retrying would give the same answer.
    #[error("Document rejected ({kind}): {message}")]
    Rejected { kind: String, message: String },
}

impl DispatchError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn rejected(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Rejected {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Whether the document may be handed to another processor
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Errors returned by queue operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// Documents are waiting but no processor has been registered
    #[error("No processors registered")]
    NoProcessors,

    /// A dispatch is already running
    #[error("Dispatch already in progress")]
    DispatchInProgress,
}

impl QueueError {
    /// Machine-readable error kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NoProcessors => "no_processors",
            Self::DispatchInProgress => "dispatch_in_progress",
        }
    }
}

/// Result type alias for queue operations
pub type Result<T> = std::result::Result<T, QueueError>;
