//! Infrastructure layer - Adapter implementations

mod fs_source;
mod http_clients;
mod process_lifecycle;

pub use fs_source::FsDocumentSource;
pub use http_clients::{HttpAggregatorClient, HttpProcessorClient, HttpQueueClient};
pub use process_lifecycle::{ProcessLifecycle, ProcessLifecycleConfig};
