//! Ports (trait definitions) for everything outside a worker process
//!
//! The domain defines what it needs and the adapters provide it:
//!
//! - `DocumentSource`: where a processor reads document bytes from
//! - `SegmentPublisher`: the publishing side of the broadcast bus
//! - `ProcessorClient`: the queue's synchronous call into a processor
//! - `QueueClient` / `AggregatorClient`: the orchestrator's view of its workers
//! - `WorkerLifecycle`: the control plane that creates and deletes workers
//!
//! ## Static Dispatch
//!
//! Async ports use native `impl Future` return types instead of `async_trait`,
//! so every service is monomorphized over its concrete adapters.

use std::future::Future;

use crate::aggregator::AggregatorSnapshot;
use crate::document::{DocumentRef, TopicSegment};
use crate::orchestrator::{ClientError, LifecycleError, WorkerEndpoint, WorkerSpec, WorkerStatus};
use crate::processor::{ProcessAck, ProcessingError, PublishError};
use crate::queue::{DispatchError, QueueStatus};

/// Port for reading raw document bytes
pub trait DocumentSource: Send + Sync {
    /// Read the full content of a document
    ///
    /// # Errors
    ///
    /// Returns `ProcessingError::ReadError` if the document does not exist or
    /// cannot be read.
    fn read(
        &self,
        reference: &DocumentRef,
    ) -> impl Future<Output = Result<Vec<u8>, ProcessingError>> + Send;
}

/// Port for the publishing side of the broadcast bus
///
/// Publishing is fire-and-forget and never blocks on subscribers. The returned
/// count is the number of subscribers the segment was handed to, which may be
/// zero; it is not a delivery confirmation.
#[cfg_attr(test, mockall::automock)]
pub trait SegmentPublisher: Send + Sync {
    /// Publish a segment keyed by its topic name
    ///
    /// # Errors
    ///
    /// Returns `PublishError::Closed` only when the bus itself has been shut down.
    fn publish(&self, segment: &TopicSegment) -> Result<usize, PublishError>;
}

/// Port for the queue's processing call into one processor
pub trait ProcessorClient: Send + Sync {
    /// Ask `processor` to process one document and wait for its ack
    ///
    /// # Errors
    ///
    /// - `DispatchError::Unavailable` if the processor could not be reached
    ///   or failed on its own side; the document may be retried elsewhere
    /// - `DispatchError::Rejected` if the processor rejected the document itself
    fn process(
        &self,
        processor: &str,
        reference: &DocumentRef,
    ) -> impl Future<Output = Result<ProcessAck, DispatchError>> + Send;
}

/// Port for the orchestrator's calls into a Worker Queue
pub trait QueueClient: Send + Sync {
    /// Register processor endpoints with the queue
    fn register_processors(
        &self,
        queue: &WorkerEndpoint,
        processors: &[String],
    ) -> impl Future<Output = Result<(), ClientError>> + Send;

    /// Add documents to the queue's pending set
    fn submit_documents(
        &self,
        queue: &WorkerEndpoint,
        documents: &[DocumentRef],
    ) -> impl Future<Output = Result<(), ClientError>> + Send;

    /// Start dispatching in the background; returns once dispatch is accepted
    fn start_dispatch(
        &self,
        queue: &WorkerEndpoint,
    ) -> impl Future<Output = Result<(), ClientError>> + Send;

    /// Current per-document state and dispatch phase
    fn status(
        &self,
        queue: &WorkerEndpoint,
    ) -> impl Future<Output = Result<QueueStatus, ClientError>> + Send;
}

/// Port for the orchestrator's calls into a Topic Aggregator
pub trait AggregatorClient: Send + Sync {
    /// Whether every bus subscription of the aggregator has been acknowledged
    fn is_subscribed(
        &self,
        aggregator: &WorkerEndpoint,
    ) -> impl Future<Output = Result<bool, ClientError>> + Send;

    /// Current totals, without changing the aggregator's state
    fn metrics(
        &self,
        aggregator: &WorkerEndpoint,
    ) -> impl Future<Output = Result<AggregatorSnapshot, ClientError>> + Send;

    /// Final totals; the aggregator is marked drained
    fn drain(
        &self,
        aggregator: &WorkerEndpoint,
    ) -> impl Future<Output = Result<AggregatorSnapshot, ClientError>> + Send;
}

/// Port for the worker control plane
///
/// The backend is the source of truth for what is running. The orchestrator
/// only keeps a cached view in its `WorkerPool`.
pub trait WorkerLifecycle: Send + Sync {
    /// Create a worker and return where it can be reached
    ///
    /// The worker is not necessarily ready when this returns; poll `status`.
    ///
    /// # Errors
    ///
    /// Returns `LifecycleError::SpawnFailed` if the backend could not start it.
    fn create(
        &self,
        spec: &WorkerSpec,
    ) -> impl Future<Output = Result<WorkerEndpoint, LifecycleError>> + Send;

    /// Delete a worker and release its resources
    ///
    /// # Errors
    ///
    /// Returns `LifecycleError::UnknownWorker` if the backend has no such worker.
    fn delete(
        &self,
        worker: &WorkerEndpoint,
    ) -> impl Future<Output = Result<(), LifecycleError>> + Send;

    /// Current status of a worker
    fn status(
        &self,
        worker: &WorkerEndpoint,
    ) -> impl Future<Output = Result<WorkerStatus, LifecycleError>> + Send;
}
