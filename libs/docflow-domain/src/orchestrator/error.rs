//! Errors for job orchestration and the orchestrator's outbound ports

use thiserror::Error;

/// Errors that end an analysis job
///
/// Whatever the error, every worker provisioned for the job has been torn
/// down by the time it is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    /// The request is malformed (no documents, no topics, blank topic)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A worker could not be provisioned or never became ready
    #[error("Provisioning failed: {0}")]
    ProvisioningError(String),

    /// Dispatch failed or the queue stopped answering
    #[error("Job failed: {0}")]
    JobFailed(String),

    /// Another job is already running on this orchestrator
    #[error("Another analysis job is already running")]
    Busy,
}

impl JobError {
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn provisioning(msg: impl Into<String>) -> Self {
        Self::ProvisioningError(msg.into())
    }

    pub fn job_failed(msg: impl Into<String>) -> Self {
        Self::JobFailed(msg.into())
    }

    /// Machine-readable error kind
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::ProvisioningError(_) => "provisioning_error",
            Self::JobFailed(_) => "job_failed",
            Self::Busy => "busy",
        }
    }
}

/// Errors from the worker control plane
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    /// The backend could not start the worker
    #[error("Failed to start worker: {0}")]
    SpawnFailed(String),

    /// The backend does not know this worker
    #[error("Unknown worker: {0}")]
    UnknownWorker(String),

    #[error("Lifecycle I/O error: {0}")]
    Io(String),
}

impl LifecycleError {
    pub fn spawn_failed(msg: impl Into<String>) -> Self {
        Self::SpawnFailed(msg.into())
    }

    pub fn unknown_worker(id: impl Into<String>) -> Self {
        Self::UnknownWorker(id.into())
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }
}

/// Errors from request/response calls into another worker
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// The worker could not be reached or did not answer in time
    #[error("Worker unreachable: {0}")]
    Unreachable(String),

    /// The worker answered with an error status
    #[error("Worker rejected the request with status {status}: {message}")]
    Rejected { status: u16, message: String },

    /// The worker answered with something that could not be decoded
    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl ClientError {
    pub fn unreachable(msg: impl Into<String>) -> Self {
        Self::Unreachable(msg.into())
    }

    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self::Rejected {
            status,
            message: message.into(),
        }
    }

    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }
}

/// Result type alias for orchestration
pub type Result<T> = std::result::Result<T, JobError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_error_kinds() {
        assert_eq!(JobError::invalid_request("x").kind(), "invalid_request");
        assert_eq!(JobError::provisioning("x").kind(), "provisioning_error");
        assert_eq!(JobError::job_failed("x").kind(), "job_failed");
        assert_eq!(JobError::Busy.kind(), "busy");
    }

    #[test]
    fn test_client_error_display() {
        let err = ClientError::rejected(409, "Dispatch already in progress");
        assert_eq!(
            err.to_string(),
            "Worker rejected the request with status 409: Dispatch already in progress"
        );
    }
}
