//! # docflow Domain Layer
//!
//! This crate contains the business logic of the docflow document analytics
//! pipeline. It follows the same hexagonal layout as the rest of the workspace:
//!
//! - **Analytics**: Pure topic extraction and text metrics (no I/O)
//! - **Entities**: Documents, topic segments, jobs and worker records
//! - **Services**: Document Processor, Worker Queue, Topic Aggregator, Orchestrator
//! - **Ports**: Traits for everything outside the process (document storage, the
//!   broadcast bus, worker-to-worker calls and the worker control plane)
//!
//! ## Architecture
//!
//! Nothing in here knows about HTTP, TCP or child processes. Adapters in
//! `docflow-adapters` and `docflow-bus` implement the ports.
//!
//! ## Example
//!
//! ```rust
//! use docflow_domain::analytics::{analyze_content, extract_topics};
//!
//! let topics = extract_topics("intro\n# Sport\nGoal!\n");
//! assert_eq!(topics.get("Sport"), Some("# Sport\nGoal!\n"));
//!
//! let metrics = analyze_content("a b\ncc\n");
//! assert_eq!((metrics.line_count, metrics.word_count, metrics.char_count), (2, 3, 5));
//! ```

pub mod aggregator;
pub mod analytics;
pub mod document;
pub mod orchestrator;
pub mod ports;
pub mod processor;
pub mod queue;

// Re-export commonly used types
pub use aggregator::{AggregatorPhase, AggregatorSnapshot, TopicAggregator};
pub use analytics::{analyze_content, extract_topics, Metrics, TopicMap, NO_TOPIC};
pub use document::{Document, DocumentRef, JobId, TopicSegment, WorkerId};
pub use orchestrator::{AnalysisRequest, JobError, JobResult, JobStatus, Orchestrator};
pub use processor::{DocumentProcessor, ProcessAck, ProcessingError};
pub use queue::{DocumentState, QueueStatus, WorkerQueue};
