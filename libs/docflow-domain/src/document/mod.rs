//! Document entities
//!
//! Documents flowing into the pipeline, the topic segments cut out of them, and
//! the identifiers used to track jobs and workers.

mod entity;
mod ids;

pub use entity::{Document, DocumentRef, TopicSegment};
pub use ids::{JobId, WorkerId};
