use thiserror::Error;

/// Errors raised by the analytics library
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalyticsError {
    /// The input is not text (e.g. bytes that are not valid UTF-8)
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
}

impl AnalyticsError {
    /// Create an invalid document error with a message
    pub fn invalid_document(msg: impl Into<String>) -> Self {
        Self::InvalidDocument(msg.into())
    }
}

/// Result type alias for analytics operations
pub type Result<T> = std::result::Result<T, AnalyticsError>;
