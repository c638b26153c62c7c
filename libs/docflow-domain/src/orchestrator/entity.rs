use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use super::JobError;
use crate::analytics::Metrics;
use crate::document::{DocumentRef, JobId};
use crate::queue::{DocumentState, DocumentStatus};

/// Client request: documents to analyze and topics of interest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub documents: Vec<DocumentRef>,
    pub topics: Vec<String>,
}

impl AnalysisRequest {
    pub fn new(
        documents: impl IntoIterator<Item = impl Into<DocumentRef>>,
        topics: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            documents: documents.into_iter().map(Into::into).collect(),
            topics: topics.into_iter().map(Into::into).collect(),
        }
    }

    /// Validate the request and collapse duplicates, keeping first occurrences
    ///
    /// # Errors
    ///
    /// Returns `JobError::InvalidRequest` if there is no document, no topic, or
    /// a blank topic name.
    pub fn normalize(self) -> Result<Self, JobError> {
        if self.documents.is_empty() {
            return Err(JobError::invalid_request("at least one document is required"));
        }
        if self.topics.is_empty() {
            return Err(JobError::invalid_request("at least one topic is required"));
        }
        if self.topics.iter().any(|t| t.trim().is_empty()) {
            return Err(JobError::invalid_request("topic names must not be blank"));
        }

        let mut seen = HashSet::new();
        let documents = self
            .documents
            .into_iter()
            .filter(|d| seen.insert(d.clone()))
            .collect();

        let mut seen = HashSet::new();
        let topics = self
            .topics
            .into_iter()
            .filter(|t| seen.insert(t.clone()))
            .collect();

        Ok(Self { documents, topics })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Every document processed and every aggregator answered
    Complete,
    /// Some documents failed or timed out, or some aggregator was missing
    Partial,
}

/// Final state of one document in a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentOutcome {
    pub state: DocumentState,
    pub attempts: u32,
    pub error: Option<String>,
}

impl From<&DocumentStatus> for DocumentOutcome {
    fn from(status: &DocumentStatus) -> Self {
        Self {
            state: status.state,
            attempts: status.attempts,
            error: status.error.clone(),
        }
    }
}

/// Result returned to the client
///
/// Metrics may undercount when bus segments were lost; they are never inflated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResult {
    pub job_id: JobId,
    pub status: JobStatus,
    /// Totals per requested topic whose aggregator answered
    pub metrics: BTreeMap<String, Metrics>,
    pub documents: BTreeMap<DocumentRef, DocumentOutcome>,
    /// Requested topics whose aggregator could not be queried
    pub missing_topics: Vec<String>,
}

/// Where the orchestrator is in its current job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    Idle,
    Provisioning,
    AwaitingSubscriptions,
    Dispatching,
    Collecting,
    TearingDown,
    Finished,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobProgress {
    pub job_id: Option<JobId>,
    pub phase: JobPhase,
}

impl Default for JobProgress {
    fn default() -> Self {
        Self {
            job_id: None,
            phase: JobPhase::Idle,
        }
    }
}
