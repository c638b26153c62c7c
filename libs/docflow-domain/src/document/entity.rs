//! Documents and topic segments

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::analytics::{extract_topics, AnalyticsError};

/// Reference to a document to analyze (a path understood by the document source)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentRef(String);

impl DocumentRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DocumentRef {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for DocumentRef {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A document that has been read and is known to be text
///
/// Immutable once created. The processor owns it only while extracting
/// segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    id: DocumentRef,
    content: String,
}

impl Document {
    pub fn new(id: DocumentRef, content: impl Into<String>) -> Self {
        Self {
            id,
            content: content.into(),
        }
    }

    /// Build a document from raw bytes
    ///
    /// # Errors
    ///
    /// Returns `AnalyticsError::InvalidDocument` if the bytes are not UTF-8 text.
    pub fn from_bytes(id: DocumentRef, bytes: Vec<u8>) -> Result<Self, AnalyticsError> {
        let content = String::from_utf8(bytes).map_err(|e| {
            AnalyticsError::invalid_document(format!("{} is not UTF-8 text: {}", id, e))
        })?;

        Ok(Self { id, content })
    }

    pub fn id(&self) -> &DocumentRef {
        &self.id
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Split the document into its topic segments, in document order
    pub fn segments(&self) -> Vec<TopicSegment> {
        extract_topics(&self.content)
            .into_iter()
            .map(|(topic, content)| TopicSegment::new(topic, content, Some(self.id.clone())))
            .collect()
    }
}

/// The text of one topic inside one document
///
/// Exists only as a message on the broadcast bus. The source document travels
/// with the segment inside a process but is not part of the wire format, so
/// segments received from the bus have no source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicSegment {
    pub topic: String,
    pub content: String,
    pub source: Option<DocumentRef>,
}

impl TopicSegment {
    pub fn new(
        topic: impl Into<String>,
        content: impl Into<String>,
        source: Option<DocumentRef>,
    ) -> Self {
        Self {
            topic: topic.into(),
            content: content.into(),
            source,
        }
    }
}
