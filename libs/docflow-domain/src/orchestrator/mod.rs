//! Orchestrator
//!
//! Runs one analysis job end to end: provisions a Worker Queue, a pool of
//! Document Processors and one Topic Aggregator per topic, wires them
//! together, waits for dispatch to finish, collects the per-topic totals and
//! tears every worker down again.

mod config;
mod entity;
mod error;
mod pool;
mod service;

pub use config::OrchestratorConfig;
pub use entity::{AnalysisRequest, DocumentOutcome, JobPhase, JobProgress, JobResult, JobStatus};
pub use error::{ClientError, JobError, LifecycleError, Result};
pub use pool::{
    ProvisioningStatus, WorkerEndpoint, WorkerKind, WorkerPool, WorkerRecord, WorkerRole,
    WorkerSpec, WorkerStatus,
};
pub use service::Orchestrator;
