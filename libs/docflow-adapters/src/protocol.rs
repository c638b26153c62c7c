//! Worker-to-worker HTTP protocol
//!
//! Response bodies reuse the domain types directly (`ProcessAck`,
//! `QueueStatus`, `AggregatorSnapshot`); only request bodies and the error
//! body are defined here.

use serde::{Deserialize, Serialize};

use docflow_domain::document::DocumentRef;

/// Endpoint paths
pub mod endpoints {
    pub const HEALTH: &str = "/health";

    // processor
    pub const PROCESS: &str = "/process";

    // queue
    pub const DOCUMENTS: &str = "/documents";
    pub const PROCESSORS: &str = "/processors";
    pub const DISPATCH: &str = "/dispatch";
    pub const STATUS: &str = "/status";

    // aggregator
    pub const READY: &str = "/ready";
    pub const METRICS: &str = "/metrics";
    pub const DRAIN: &str = "/drain";
}

/// Environment variables read by `docflow-node`
pub mod env {
    pub const ROLE: &str = "DOCFLOW_ROLE";
    pub const HOST: &str = "DOCFLOW_HOST";
    pub const PORT: &str = "DOCFLOW_PORT";
    pub const BUS_PORT: &str = "DOCFLOW_BUS_PORT";
    pub const TOPIC: &str = "DOCFLOW_TOPIC";
    pub const BUS_SOURCES: &str = "DOCFLOW_BUS_SOURCES";
    pub const DOCUMENT_ROOT: &str = "DOCFLOW_DOCUMENT_ROOT";
    pub const CALL_TIMEOUT_SECS: &str = "DOCFLOW_CALL_TIMEOUT_SECS";
    pub const MAX_ATTEMPTS: &str = "DOCFLOW_MAX_ATTEMPTS";
    pub const MAX_PROCESSORS: &str = "DOCFLOW_MAX_PROCESSORS";
    pub const JOB_TIMEOUT_SECS: &str = "DOCFLOW_JOB_TIMEOUT_SECS";
    pub const SETTLE_DELAY_MS: &str = "DOCFLOW_SETTLE_DELAY_MS";
    pub const PROVISION_ATTEMPTS: &str = "DOCFLOW_PROVISION_ATTEMPTS";
    pub const NODE_BINARY: &str = "DOCFLOW_NODE_BINARY";
    pub const LOG_FORMAT: &str = "DOCFLOW_LOG_FORMAT";
    pub const WORKER_NAME: &str = "DOCFLOW_WORKER_NAME";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessRequest {
    pub document: DocumentRef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitDocumentsRequest {
    pub documents: Vec<DocumentRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterProcessorsRequest {
    /// Base URLs of the processors' APIs
    pub processors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadyResponse {
    pub topic: String,
    pub ready: bool,
}

/// Body of every error response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Machine-readable error kind (e.g. `parse_error`)
    pub kind: String,
    pub error: String,
}

impl ErrorBody {
    pub fn new(kind: impl Into<String>, error: impl ToString) -> Self {
        Self {
            kind: kind.into(),
            error: error.to_string(),
        }
    }
}

/// Join a worker's base URL and an endpoint path
pub fn url(base: &str, path: &str) -> String {
    format!("{}{}", base.trim_end_matches('/'), path)
}
