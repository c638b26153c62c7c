//! Orchestrator service

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use super::{
    AnalysisRequest, DocumentOutcome, JobError, JobPhase, JobProgress, JobResult, JobStatus,
    OrchestratorConfig, ProvisioningStatus, Result, WorkerEndpoint, WorkerPool, WorkerSpec,
    WorkerStatus,
};
use crate::analytics::Metrics;
use crate::document::JobId;
use crate::ports::{AggregatorClient, QueueClient, WorkerLifecycle};
use crate::queue::{DispatchPhase, DocumentState, QueueStatus};

/// Clears the busy flag when the job ends, however it ends
struct JobGuard<'a>(&'a AtomicBool);

impl Drop for JobGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Runs analysis jobs against a worker control plane
///
/// Generic over the lifecycle backend and the two worker clients, so the same
/// orchestration runs against child processes in production and in-process
/// fakes in tests. One job at a time.
pub struct Orchestrator<L, Q, A> {
    lifecycle: L,
    queue_client: Q,
    aggregator_client: A,
    config: OrchestratorConfig,
    busy: AtomicBool,
    progress: RwLock<JobProgress>,
}

impl<L, Q, A> Orchestrator<L, Q, A>
where
    L: WorkerLifecycle,
    Q: QueueClient,
    A: AggregatorClient,
{
    pub fn new(lifecycle: L, queue_client: Q, aggregator_client: A, config: OrchestratorConfig) -> Self {
        Self {
            lifecycle,
            queue_client,
            aggregator_client,
            config,
            busy: AtomicBool::new(false),
            progress: RwLock::new(JobProgress::default()),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Phase of the current (or last) job
    pub async fn progress(&self) -> JobProgress {
        self.progress.read().await.clone()
    }

    /// Run one analysis job to completion
    ///
    /// Every worker provisioned for the job is torn down before this returns,
    /// whatever the outcome.
    ///
    /// # Errors
    ///
    /// - `JobError::InvalidRequest` if the request has no documents or topics
    /// - `JobError::Busy` if another job is running
    /// - `JobError::ProvisioningError` if a worker could not be provisioned or
    ///   the aggregators never confirmed their subscriptions
    /// - `JobError::JobFailed` if dispatch failed or the queue became unreachable
    pub async fn run_analysis(&self, request: AnalysisRequest) -> Result<JobResult> {
        let request = request.normalize()?;

        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(JobError::Busy);
        }
        let _guard = JobGuard(&self.busy);

        let job = JobId::new();
        info!(
            job_id = %job,
            documents = request.documents.len(),
            topics = request.topics.len(),
            "Starting analysis job"
        );

        let mut pool = WorkerPool::new(job);
        let outcome = self.execute(job, &request, &mut pool).await;

        self.set_phase(job, JobPhase::TearingDown).await;
        self.teardown(&mut pool).await;

        match &outcome {
            Ok(result) => {
                info!(job_id = %job, status = ?result.status, "Analysis job finished");
                self.set_phase(job, JobPhase::Finished).await;
            }
            Err(e) => {
                warn!(job_id = %job, error = %e, "Analysis job failed");
                self.set_phase(job, JobPhase::Failed).await;
            }
        }

        outcome
    }

    async fn execute(
        &self,
        job: JobId,
        request: &AnalysisRequest,
        pool: &mut WorkerPool,
    ) -> Result<JobResult> {
        self.set_phase(job, JobPhase::Provisioning).await;

        let queue = self.provision(pool, WorkerSpec::queue(job)).await?;

        let processor_count = request.documents.len().min(self.config.max_processors).max(1);
        let mut processors = Vec::with_capacity(processor_count);
        for index in 0..processor_count {
            processors.push(self.provision(pool, WorkerSpec::processor(job, index)).await?);
        }

        let sources: Vec<String> = processors.iter().filter_map(|p| p.bus.clone()).collect();
        let mut aggregators = Vec::with_capacity(request.topics.len());
        for (index, topic) in request.topics.iter().enumerate() {
            let spec = WorkerSpec::aggregator(job, index, topic.clone(), sources.clone());
            let endpoint = self.provision(pool, spec).await?;
            aggregators.push((topic.clone(), endpoint));
        }

        self.set_phase(job, JobPhase::AwaitingSubscriptions).await;
        self.await_subscriptions(&aggregators).await?;
        if !self.config.settle_delay.is_zero() {
            tokio::time::sleep(self.config.settle_delay).await;
        }

        self.set_phase(job, JobPhase::Dispatching).await;
        let apis: Vec<String> = processors.iter().map(|p| p.api.clone()).collect();
        self.queue_client
            .register_processors(&queue, &apis)
            .await
            .map_err(|e| JobError::job_failed(format!("Cannot register processors: {}", e)))?;
        self.queue_client
            .submit_documents(&queue, &request.documents)
            .await
            .map_err(|e| JobError::job_failed(format!("Cannot submit documents: {}", e)))?;
        self.queue_client
            .start_dispatch(&queue)
            .await
            .map_err(|e| JobError::job_failed(format!("Cannot start dispatch: {}", e)))?;

        let status = self.wait_for_queue(&queue).await?;

        // segments published last may still be on their way to the aggregators
        self.set_phase(job, JobPhase::Collecting).await;
        if !self.config.settle_delay.is_zero() {
            tokio::time::sleep(self.config.settle_delay).await;
        }
        let (metrics, missing_topics) = self.collect(&aggregators).await;

        Ok(build_result(job, &status, metrics, missing_topics))
    }

    /// Create a worker and wait until it is ready, retrying on failure
    #[instrument(skip(self, pool, spec), fields(worker = %spec.name))]
    async fn provision(&self, pool: &mut WorkerPool, spec: WorkerSpec) -> Result<WorkerEndpoint> {
        let attempts = self.config.provision_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match self.lifecycle.create(&spec).await {
                Ok(endpoint) => match self.wait_ready(&endpoint).await {
                    Ok(()) => {
                        info!(worker_id = %endpoint.id, api = %endpoint.api, "Worker ready");
                        pool.add(&spec, endpoint.clone());
                        return Ok(endpoint);
                    }
                    Err(reason) => {
                        warn!(attempt = attempt, error = %reason, "Worker did not become ready");
                        if let Err(e) = self.lifecycle.delete(&endpoint).await {
                            warn!(worker_id = %endpoint.id, error = %e, "Failed to delete worker");
                        }
                        last_error = reason;
                    }
                },
                Err(e) => {
                    warn!(attempt = attempt, error = %e, "Failed to create worker");
                    last_error = e.to_string();
                }
            }

            if attempt < attempts {
                tokio::time::sleep(self.config.provision_backoff).await;
            }
        }

        Err(JobError::provisioning(format!(
            "{} not ready after {} attempts: {}",
            spec.name, attempts, last_error
        )))
    }

    async fn wait_ready(&self, endpoint: &WorkerEndpoint) -> std::result::Result<(), String> {
        let poll = async {
            loop {
                match self.lifecycle.status(endpoint).await {
                    Ok(WorkerStatus::Ready) => return Ok(()),
                    Ok(WorkerStatus::Failed) => return Err("worker failed".to_string()),
                    Ok(WorkerStatus::NotReady) => {}
                    Err(e) => return Err(e.to_string()),
                }
                tokio::time::sleep(self.config.readiness_poll_interval).await;
            }
        };

        match tokio::time::timeout(self.config.readiness_timeout, poll).await {
            Ok(result) => result,
            Err(_) => Err(format!(
                "not ready within {:?}",
                self.config.readiness_timeout
            )),
        }
    }

    /// Block until every aggregator confirmed all of its bus subscriptions
    async fn await_subscriptions(&self, aggregators: &[(String, WorkerEndpoint)]) -> Result<()> {
        let mut waiting: Vec<&(String, WorkerEndpoint)> = aggregators.iter().collect();

        let poll = async {
            loop {
                let mut still_waiting = Vec::with_capacity(waiting.len());
                for entry in waiting.drain(..) {
                    let (topic, endpoint) = entry;
                    match self.aggregator_client.is_subscribed(endpoint).await {
                        Ok(true) => debug!(topic = %topic, "Aggregator subscribed"),
                        Ok(false) => still_waiting.push(entry),
                        Err(e) => {
                            debug!(topic = %topic, error = %e, "Aggregator not answering yet");
                            still_waiting.push(entry);
                        }
                    }
                }
                if still_waiting.is_empty() {
                    return;
                }
                waiting = still_waiting;
                tokio::time::sleep(self.config.readiness_poll_interval).await;
            }
        };

        tokio::time::timeout(self.config.subscription_timeout, poll)
            .await
            .map_err(|_| {
                JobError::provisioning(format!(
                    "aggregators did not confirm their subscriptions within {:?}",
                    self.config.subscription_timeout
                ))
            })?;

        info!(aggregators = aggregators.len(), "All aggregators subscribed");
        Ok(())
    }

    /// Poll the queue until every document is terminal or the job times out
    ///
    /// On timeout the last status seen is returned; documents still pending
    /// or assigned in it make the result partial.
    async fn wait_for_queue(&self, queue: &WorkerEndpoint) -> Result<QueueStatus> {
        let mut last = None;

        let polled =
            tokio::time::timeout(self.config.job_timeout, self.poll_queue(queue, &mut last)).await;

        match polled {
            Ok(result) => result,
            Err(_) => {
                warn!(timeout = ?self.config.job_timeout, "Job timed out, collecting partial results");
                last.ok_or_else(|| JobError::job_failed("queue never reported its status"))
            }
        }
    }

    async fn poll_queue(
        &self,
        queue: &WorkerEndpoint,
        last: &mut Option<QueueStatus>,
    ) -> Result<QueueStatus> {
        let mut failures = 0;

        loop {
            match self.queue_client.status(queue).await {
                Ok(status) => {
                    failures = 0;

                    if let DispatchPhase::Failed(message) = &status.phase {
                        return Err(JobError::job_failed(format!("Dispatch failed: {}", message)));
                    }
                    if status.all_terminal() {
                        return Ok(status);
                    }

                    debug!(
                        done = status.count(DocumentState::Done),
                        failed = status.count(DocumentState::Failed),
                        total = status.documents.len(),
                        "Dispatch in progress"
                    );
                    *last = Some(status);
                }
                Err(e) => {
                    failures += 1;
                    warn!(failures = failures, error = %e, "Queue status query failed");
                    if failures > self.config.max_status_failures {
                        return Err(JobError::job_failed(format!("Queue unreachable: {}", e)));
                    }
                }
            }

            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    /// Drain every aggregator; those that cannot be queried are reported missing
    async fn collect(
        &self,
        aggregators: &[(String, WorkerEndpoint)],
    ) -> (BTreeMap<String, Metrics>, Vec<String>) {
        let mut metrics = BTreeMap::new();
        let mut missing = Vec::new();

        for (topic, endpoint) in aggregators {
            match self.aggregator_client.drain(endpoint).await {
                Ok(snapshot) => {
                    debug!(
                        topic = %topic,
                        segments = snapshot.segment_count,
                        "Collected topic totals"
                    );
                    metrics.insert(topic.clone(), snapshot.metrics);
                }
                Err(e) => {
                    warn!(topic = %topic, error = %e, "Aggregator could not be queried");
                    missing.push(topic.clone());
                }
            }
        }

        (metrics, missing)
    }

    /// Delete every worker, most recent first; failures are logged and skipped
    async fn teardown(&self, pool: &mut WorkerPool) {
        let workers = pool.teardown_order();
        if workers.is_empty() {
            return;
        }

        info!(job_id = %pool.job(), workers = workers.len(), "Tearing down workers");

        for endpoint in workers {
            match self.lifecycle.delete(&endpoint).await {
                Ok(()) => pool.mark(&endpoint.id, ProvisioningStatus::Deleted),
                Err(e) => {
                    warn!(worker_id = %endpoint.id, error = %e, "Failed to delete worker");
                    pool.mark(&endpoint.id, ProvisioningStatus::DeleteFailed);
                }
            }
        }
    }

    async fn set_phase(&self, job: JobId, phase: JobPhase) {
        debug!(job_id = %job, phase = ?phase, "Job phase");
        *self.progress.write().await = JobProgress {
            job_id: Some(job),
            phase,
        };
    }
}

impl<L, Q, A> Orchestrator<L, Q, A>
where
    L: WorkerLifecycle + 'static,
    Q: QueueClient + 'static,
    A: AggregatorClient + 'static,
{
    /// Run a job on its own task and wait for it
    ///
    /// Dropping the returned future does not cancel the job: it still runs
    /// through teardown, and the orchestrator stays busy until then.
    pub async fn run_detached(self: Arc<Self>, request: AnalysisRequest) -> Result<JobResult> {
        let job = tokio::spawn(async move { self.run_analysis(request).await });

        match job.await {
            Ok(outcome) => outcome,
            Err(e) => Err(JobError::job_failed(format!("Job task aborted: {}", e))),
        }
    }
}

fn build_result(
    job: JobId,
    status: &QueueStatus,
    metrics: BTreeMap<String, Metrics>,
    missing_topics: Vec<String>,
) -> JobResult {
    let done = status.count(DocumentState::Done);
    let complete = done == status.documents.len() && missing_topics.is_empty();

    JobResult {
        job_id: job,
        status: if complete {
            JobStatus::Complete
        } else {
            JobStatus::Partial
        },
        metrics,
        documents: status
            .documents
            .iter()
            .map(|d| (d.reference.clone(), DocumentOutcome::from(d)))
            .collect(),
        missing_topics,
    }
}
