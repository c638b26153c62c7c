//! Workers provisioned for one job
//!
//! The pool is the orchestrator's cached view of what it created. The
//! lifecycle backend stays the source of truth; the pool mainly remembers the
//! provisioning order so teardown can run in reverse.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::document::{JobId, WorkerId};

/// The three worker roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerKind {
    Queue,
    Processor,
    Aggregator,
}

impl WorkerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queue => "queue",
            Self::Processor => "processor",
            Self::Aggregator => "aggregator",
        }
    }
}

/// Role of a worker together with the configuration it needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "role")]
pub enum WorkerRole {
    Queue,
    Processor,
    /// Aggregator for `topic`, subscribing to every bus address in `sources`
    Aggregator { topic: String, sources: Vec<String> },
}

impl WorkerRole {
    pub fn kind(&self) -> WorkerKind {
        match self {
            Self::Queue => WorkerKind::Queue,
            Self::Processor => WorkerKind::Processor,
            Self::Aggregator { .. } => WorkerKind::Aggregator,
        }
    }

    pub fn topic(&self) -> Option<&str> {
        match self {
            Self::Aggregator { topic, .. } => Some(topic),
            _ => None,
        }
    }
}

/// What the lifecycle backend is asked to create
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerSpec {
    pub job: JobId,
    /// Unique, human-readable name (`docflow-<job>-<role>-<n>`)
    pub name: String,
    pub role: WorkerRole,
}

impl WorkerSpec {
    pub fn queue(job: JobId) -> Self {
        Self {
            job,
            name: format!("docflow-{}-queue", job.short()),
            role: WorkerRole::Queue,
        }
    }

    pub fn processor(job: JobId, index: usize) -> Self {
        Self {
            job,
            name: format!("docflow-{}-processor-{}", job.short(), index),
            role: WorkerRole::Processor,
        }
    }

    pub fn aggregator(job: JobId, index: usize, topic: impl Into<String>, sources: Vec<String>) -> Self {
        Self {
            job,
            name: format!("docflow-{}-aggregator-{}", job.short(), index),
            role: WorkerRole::Aggregator {
                topic: topic.into(),
                sources,
            },
        }
    }
}

/// Where a provisioned worker can be reached
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkerEndpoint {
    pub id: WorkerId,
    /// Base URL of the worker's HTTP API
    pub api: String,
    /// Address of the worker's bus publisher (processors only)
    pub bus: Option<String>,
}

/// Status reported by the lifecycle backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Ready,
    NotReady,
    Failed,
}

/// The orchestrator's own view of a worker's provisioning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisioningStatus {
    Ready,
    Deleted,
    DeleteFailed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerRecord {
    pub kind: WorkerKind,
    pub name: String,
    pub topic: Option<String>,
    pub endpoint: WorkerEndpoint,
    pub status: ProvisioningStatus,
    pub created_at: DateTime<Utc>,
}

/// Workers of one job, in provisioning order
#[derive(Debug)]
pub struct WorkerPool {
    job: JobId,
    records: Vec<WorkerRecord>,
}

impl WorkerPool {
    pub fn new(job: JobId) -> Self {
        Self {
            job,
            records: Vec::new(),
        }
    }

    pub fn job(&self) -> JobId {
        self.job
    }

    /// Record a worker that became ready
    pub fn add(&mut self, spec: &WorkerSpec, endpoint: WorkerEndpoint) {
        self.records.push(WorkerRecord {
            kind: spec.role.kind(),
            name: spec.name.clone(),
            topic: spec.role.topic().map(str::to_string),
            endpoint,
            status: ProvisioningStatus::Ready,
            created_at: Utc::now(),
        });
    }

    pub fn records(&self) -> &[WorkerRecord] {
        &self.records
    }

    /// Workers still alive, most recently provisioned first
    pub fn teardown_order(&self) -> Vec<WorkerEndpoint> {
        self.records
            .iter()
            .rev()
            .filter(|r| r.status == ProvisioningStatus::Ready)
            .map(|r| r.endpoint.clone())
            .collect()
    }

    /// Update the cached status of a worker
    pub fn mark(&mut self, worker: &WorkerId, status: ProvisioningStatus) {
        if let Some(record) = self.records.iter_mut().find(|r| &r.endpoint.id == worker) {
            record.status = status;
        }
    }

    pub fn count(&self, kind: WorkerKind) -> usize {
        self.records.iter().filter(|r| r.kind == kind).count()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(id: &str) -> WorkerEndpoint {
        WorkerEndpoint {
            id: WorkerId::from(id),
            api: format!("http://{}", id),
            bus: None,
        }
    }

    #[test]
    fn test_spec_names_are_unique_per_role() {
        let job = JobId::new();
        let names = [
            WorkerSpec::queue(job).name,
            WorkerSpec::processor(job, 0).name,
            WorkerSpec::processor(job, 1).name,
            WorkerSpec::aggregator(job, 0, "Sport", Vec::new()).name,
        ];

        for (i, a) in names.iter().enumerate() {
            assert!(a.starts_with(&format!("docflow-{}-", job.short())));
            for b in &names[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_names_differ_between_consecutive_jobs() {
        let first = WorkerSpec::processor(JobId::new(), 0).name;
        let second = WorkerSpec::processor(JobId::new(), 0).name;

        assert_ne!(first, second);
    }

    #[test]
    fn test_teardown_is_reverse_order() {
        let job = JobId::new();
        let mut pool = WorkerPool::new(job);
        pool.add(&WorkerSpec::queue(job), endpoint("q"));
        pool.add(&WorkerSpec::processor(job, 0), endpoint("p0"));
        pool.add(&WorkerSpec::aggregator(job, 0, "Sport", vec![]), endpoint("a0"));

        let order: Vec<String> = pool
            .teardown_order()
            .into_iter()
            .map(|e| e.id.to_string())
            .collect();
        assert_eq!(order, vec!["a0", "p0", "q"]);
        assert_eq!(pool.records()[2].topic.as_deref(), Some("Sport"));
    }

    #[test]
    fn test_deleted_workers_leave_teardown_order() {
        let job = JobId::new();
        let mut pool = WorkerPool::new(job);
        pool.add(&WorkerSpec::queue(job), endpoint("q"));
        pool.add(&WorkerSpec::processor(job, 0), endpoint("p0"));

        pool.mark(&WorkerId::from("p0"), ProvisioningStatus::Deleted);

        assert_eq!(pool.teardown_order().len(), 1);
        assert_eq!(pool.count(WorkerKind::Processor), 1);
    }
}
