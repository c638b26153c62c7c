//! Error types for the broadcast bus

use std::time::Duration;

use thiserror::Error;

/// Result type alias for bus operations
pub type Result<T> = std::result::Result<T, BusError>;

/// Errors that can occur on the broadcast bus
#[derive(Error, Debug)]
pub enum BusError {
    #[error("Bus I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A frame part exceeds the size limit
    #[error("Frame part of {size} bytes exceeds the {max} byte limit")]
    FrameTooLarge { size: usize, max: usize },

    /// The peer sent something that is not a valid frame
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    /// The publisher did not acknowledge the subscription in time
    #[error("No subscription acknowledgement within {0:?}")]
    HandshakeTimeout(Duration),

    /// The publisher answered the subscription with something other than an ack
    #[error("Subscription rejected: {0}")]
    HandshakeRejected(String),

    /// The publisher has been shut down
    #[error("Publisher is closed")]
    Closed,
}

impl BusError {
    /// Create a malformed frame error
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedFrame(msg.into())
    }

    /// Create a handshake rejected error
    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::HandshakeRejected(msg.into())
    }
}
