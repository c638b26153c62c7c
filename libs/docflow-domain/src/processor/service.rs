//! Document Processor service

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::ProcessingError;
use crate::document::{Document, DocumentRef};
use crate::ports::{DocumentSource, SegmentPublisher};

/// Acknowledgement returned to the dispatcher once every segment is published
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessAck {
    pub document: DocumentRef,
    /// Topics found in the document, in document order
    pub topics: Vec<String>,
    /// Number of subscriber deliveries the bus accepted across all segments
    pub deliveries: usize,
}

/// Service that turns one document into topic segments on the bus
///
/// The processor keeps no state between documents. Publishing is
/// fire-and-forget: a segment is published whether or not an aggregator is
/// listening for its topic, and the bus never confirms delivery.
pub struct DocumentProcessor<S, P> {
    source: S,
    publisher: P,
}

impl<S, P> DocumentProcessor<S, P>
where
    S: DocumentSource,
    P: SegmentPublisher,
{
    pub fn new(source: S, publisher: P) -> Self {
        Self { source, publisher }
    }

    /// Process one document
    ///
    /// # Errors
    ///
    /// - `ProcessingError::ReadError` if the source cannot provide the document
    /// - `ProcessingError::ParseError` if the document is not text
    /// - `ProcessingError::PublishError` if the bus has been shut down
    #[instrument(skip(self, reference), fields(document = %reference))]
    pub async fn process(&self, reference: &DocumentRef) -> Result<ProcessAck, ProcessingError> {
        let bytes = self.source.read(reference).await?;

        let document = Document::from_bytes(reference.clone(), bytes)
            .map_err(|e| ProcessingError::parse_error(reference, e.to_string()))?;

        let segments = document.segments();
        debug!(segments = segments.len(), "Extracted topic segments");

        let mut topics = Vec::with_capacity(segments.len());
        let mut deliveries = 0;

        for segment in &segments {
            let delivered = self.publisher.publish(segment)?;
            if delivered == 0 {
                debug!(topic = %segment.topic, "No subscriber for topic, segment dropped");
            }
            deliveries += delivered;
            topics.push(segment.topic.clone());
        }

        if topics.is_empty() {
            warn!("Document has no content to publish");
        }

        info!(
            topics = topics.len(),
            deliveries = deliveries,
            "Document processed"
        );

        Ok(ProcessAck {
            document: reference.clone(),
            topics,
            deliveries,
        })
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }
}
