//! Worker Queue
//!
//! Singleton per job. Holds the documents to process and the registered
//! processors, hands documents out, and retries documents whose processor was
//! unavailable.

mod entity;
mod error;
mod service;

pub use entity::{DispatchPhase, DispatchSummary, DocumentState, DocumentStatus, QueueStatus};
pub use error::{DispatchError, QueueError, Result};
pub use service::{QueueConfig, WorkerQueue};
