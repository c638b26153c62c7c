//! # docflow Adapters
//!
//! Implementations of the `docflow-domain` ports that talk to the outside
//! world:
//!
//! - `FsDocumentSource`: documents from the local filesystem
//! - `HttpProcessorClient`, `HttpQueueClient`, `HttpAggregatorClient`: calls
//!   into other workers over their HTTP APIs
//! - `ProcessLifecycle`: workers as local `docflow-node` child processes
//!
//! `protocol` holds the request/response bodies, endpoint paths and
//! environment variable names shared with the worker binary.

pub mod infrastructure;
pub mod protocol;

pub use infrastructure::{
    FsDocumentSource, HttpAggregatorClient, HttpProcessorClient, HttpQueueClient,
    ProcessLifecycle, ProcessLifecycleConfig,
};
