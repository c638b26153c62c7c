//! Topic extraction and text metrics
//!
//! Pure functions shared by the Document Processor (splitting a document into
//! topic segments) and the Topic Aggregator (measuring each segment).

mod error;
mod metrics;
mod topics;

pub use error::{AnalyticsError, Result};
pub use metrics::{analyze_content, Metrics};
pub use topics::{extract_topics, topic_metrics, TopicMap, NO_TOPIC};
