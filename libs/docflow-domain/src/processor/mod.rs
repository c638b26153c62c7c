//! Document Processor
//!
//! Stateless worker: reads one document, cuts it into topic segments and
//! publishes each segment on the broadcast bus keyed by topic name.

mod error;
mod service;

pub use error::{ProcessingError, PublishError};
pub use service::{DocumentProcessor, ProcessAck};
