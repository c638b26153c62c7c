//! Worker Queue service

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::{
    DispatchError, DispatchPhase, DispatchSummary, DocumentState, DocumentStatus, QueueError,
    QueueStatus, Result,
};
use crate::document::DocumentRef;
use crate::ports::ProcessorClient;
use crate::processor::ProcessAck;

/// Configuration for the Worker Queue
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Processing calls per document before it is marked failed (default: 3)
    pub max_attempts: u32,
    /// Timeout of one processing call (default: 30s)
    pub call_timeout: Duration,
    /// Calls in flight per registered processor (default: 1)
    pub per_processor_concurrency: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            call_timeout: Duration::from_secs(30),
            per_processor_concurrency: 1,
        }
    }
}

struct Entry {
    status: DocumentStatus,
    /// Processors that were unavailable for this document
    failed_on: HashSet<String>,
}

struct QueueState {
    entries: Vec<Entry>,
    index: HashMap<DocumentRef, usize>,
    processors: Vec<String>,
    /// Round-robin cursor into `processors`
    cursor: usize,
    phase: DispatchPhase,
}

impl QueueState {
    /// Next processor in round-robin order that has not failed for this entry,
    /// or the plain next one if they all have
    fn choose_processor(&mut self, entry: usize) -> String {
        let count = self.processors.len();
        let failed_on = &self.entries[entry].failed_on;

        let offset = (0..count)
            .find(|offset| {
                let candidate = &self.processors[(self.cursor + offset) % count];
                !failed_on.contains(candidate)
            })
            .unwrap_or(0);

        let chosen = (self.cursor + offset) % count;
        self.cursor = (chosen + 1) % count;
        self.processors[chosen].clone()
    }

    fn snapshot(&self) -> QueueStatus {
        QueueStatus {
            phase: self.phase.clone(),
            documents: self.entries.iter().map(|e| e.status.clone()).collect(),
            processors: self.processors.len(),
        }
    }
}

struct Assignment {
    entry: usize,
    processor: String,
    reference: DocumentRef,
}

/// Distributes documents to processors and tracks per-document state
///
/// All state transitions go through one async mutex. The lock is never held
/// across a processing call, so calls to distinct processors run in parallel.
pub struct WorkerQueue<C> {
    client: C,
    config: QueueConfig,
    state: Mutex<QueueState>,
}

impl<C> WorkerQueue<C>
where
    C: ProcessorClient,
{
    pub fn new(client: C, config: QueueConfig) -> Self {
        Self {
            client,
            config,
            state: Mutex::new(QueueState {
                entries: Vec::new(),
                index: HashMap::new(),
                processors: Vec::new(),
                cursor: 0,
                phase: DispatchPhase::Idle,
            }),
        }
    }

    /// Create a WorkerQueue with default configuration
    pub fn with_client(client: C) -> Self {
        Self::new(client, QueueConfig::default())
    }

    /// Add documents as pending; documents already known are ignored
    ///
    /// Returns the number of documents actually added.
    ///
    /// # Errors
    ///
    /// Returns `QueueError::DispatchInProgress` while a dispatch runs.
    pub async fn register_documents(&self, references: &[DocumentRef]) -> Result<usize> {
        let mut state = self.state.lock().await;

        if state.phase == DispatchPhase::Running {
            return Err(QueueError::DispatchInProgress);
        }

        let mut added = 0;
        for reference in references {
            if state.index.contains_key(reference) {
                debug!(document = %reference, "Document already registered");
                continue;
            }
            let position = state.entries.len();
            state.index.insert(reference.clone(), position);
            state.entries.push(Entry {
                status: DocumentStatus::pending(reference.clone()),
                failed_on: HashSet::new(),
            });
            added += 1;
        }

        info!(added = added, total = state.entries.len(), "Registered documents");
        Ok(added)
    }

    /// Add a processor endpoint; registering the same endpoint twice is a no-op
    ///
    /// Returns `true` if the processor was new.
    pub async fn register_processor(&self, endpoint: impl Into<String>) -> bool {
        let endpoint = endpoint.into();
        let mut state = self.state.lock().await;

        if state.processors.contains(&endpoint) {
            return false;
        }

        info!(processor = %endpoint, "Registered processor");
        state.processors.push(endpoint);
        true
    }

    /// Current per-document state and dispatch phase
    pub async fn status(&self) -> QueueStatus {
        self.state.lock().await.snapshot()
    }

    /// Hand every pending document to a processor until none is left
    ///
    /// Works in rounds: each round assigns all pending documents round-robin
    /// and runs the calls concurrently, with at most
    /// `per_processor_concurrency` calls in flight on any one processor.
    /// Documents whose processor was unavailable come back as pending for the
    /// next round until they run out of attempts.
    ///
    /// # Errors
    ///
    /// - `QueueError::DispatchInProgress` if a dispatch is already running
    /// - `QueueError::NoProcessors` if documents are pending but no processor
    ///   is registered; the dispatch phase becomes failed
    #[instrument(skip(self))]
    pub async fn dispatch(&self) -> Result<DispatchSummary> {
        {
            let mut state = self.state.lock().await;

            if state.phase == DispatchPhase::Running {
                return Err(QueueError::DispatchInProgress);
            }

            let pending = state
                .entries
                .iter()
                .any(|e| e.status.state == DocumentState::Pending);
            if !pending {
                debug!("Nothing to dispatch");
                return Ok(DispatchSummary::default());
            }

            if state.processors.is_empty() {
                warn!("Documents pending but no processor registered");
                state.phase = DispatchPhase::Failed(QueueError::NoProcessors.to_string());
                return Err(QueueError::NoProcessors);
            }

            state.phase = DispatchPhase::Running;
        }

        let mut summary = DispatchSummary::default();
        let mut round = 0;

        loop {
            let assignments = self.assign_pending().await;
            if assignments.is_empty() {
                break;
            }
            round += 1;
            debug!(round = round, documents = assignments.len(), "Starting dispatch round");

            let per_processor = self.config.per_processor_concurrency.max(1);
            let mut waiting: VecDeque<Assignment> = assignments.into();
            let mut busy: HashMap<String, usize> = HashMap::new();
            let mut in_flight = FuturesUnordered::new();

            loop {
                // start what fits, keeping the rest in assignment order
                let mut held = VecDeque::with_capacity(waiting.len());
                while let Some(assignment) = waiting.pop_front() {
                    let calls = busy.entry(assignment.processor.clone()).or_default();
                    if *calls < per_processor {
                        *calls += 1;
                        in_flight.push(self.call(assignment));
                    } else {
                        held.push_back(assignment);
                    }
                }
                waiting = held;

                match in_flight.next().await {
                    Some((assignment, outcome)) => {
                        if let Some(calls) = busy.get_mut(&assignment.processor) {
                            *calls -= 1;
                        }
                        self.apply(assignment, outcome, &mut summary).await
                    }
                    None => break,
                }
            }
        }

        self.state.lock().await.phase = DispatchPhase::Finished;
        info!(
            processed = summary.processed,
            failed = summary.failed,
            rounds = round,
            "Dispatch finished"
        );

        Ok(summary)
    }

    /// Mark every pending document as assigned to a processor
    async fn assign_pending(&self) -> Vec<Assignment> {
        let mut state = self.state.lock().await;

        let pending: Vec<usize> = state
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.status.state == DocumentState::Pending)
            .map(|(i, _)| i)
            .collect();

        let mut assignments = Vec::with_capacity(pending.len());
        for entry in pending {
            let processor = state.choose_processor(entry);
            let status = &mut state.entries[entry].status;
            status.state = DocumentState::Assigned;
            status.attempts += 1;
            status.processor = Some(processor.clone());

            assignments.push(Assignment {
                entry,
                processor,
                reference: status.reference.clone(),
            });
        }

        assignments
    }

    async fn call(
        &self,
        assignment: Assignment,
    ) -> (Assignment, std::result::Result<ProcessAck, DispatchError>) {
        let call = self
            .client
            .process(&assignment.processor, &assignment.reference);

        let outcome = match tokio::time::timeout(self.config.call_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(DispatchError::unavailable(format!(
                "no answer within {:?}",
                self.config.call_timeout
            ))),
        };

        (assignment, outcome)
    }

    async fn apply(
        &self,
        assignment: Assignment,
        outcome: std::result::Result<ProcessAck, DispatchError>,
        summary: &mut DispatchSummary,
    ) {
        let mut state = self.state.lock().await;
        let entry = &mut state.entries[assignment.entry];

        match outcome {
            Ok(ack) => {
                debug!(
                    document = %assignment.reference,
                    processor = %assignment.processor,
                    topics = ack.topics.len(),
                    "Document done"
                );
                entry.status.state = DocumentState::Done;
                entry.status.topics = ack.topics;
                entry.status.error = None;
                summary.processed += 1;
            }
            Err(DispatchError::Unavailable(reason)) => {
                entry.failed_on.insert(assignment.processor.clone());
                entry.status.error = Some(reason.clone());

                if entry.status.attempts >= self.config.max_attempts {
                    warn!(
                        document = %assignment.reference,
                        attempts = entry.status.attempts,
                        error = %reason,
                        "Document failed, no attempts left"
                    );
                    entry.status.state = DocumentState::Failed;
                    summary.failed += 1;
                } else {
                    warn!(
                        document = %assignment.reference,
                        processor = %assignment.processor,
                        error = %reason,
                        "Processor unavailable, document requeued"
                    );
                    entry.status.state = DocumentState::Pending;
                }
            }
            Err(DispatchError::Rejected { kind, message }) => {
                warn!(
                    document = %assignment.reference,
                    kind = %kind,
                    error = %message,
                    "Document rejected"
                );
                entry.status.state = DocumentState::Failed;
                entry.status.error = Some(format!("{}: {}", kind, message));
                summary.failed += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::Future;
    use std::sync::{Arc, Mutex as StdMutex};

    /// Scripted processor client
    ///
    /// Processors listed in `down` are unavailable, documents listed in
    /// `reject` are rejected, processors in `hang` never answer. Successful
    /// calls take `delay`.
    #[derive(Default)]
    struct FakeClient {
        down: HashSet<String>,
        hang: HashSet<String>,
        reject: HashSet<String>,
        delay: Duration,
        calls: StdMutex<Vec<(String, String)>>,
        /// Calls in flight and the most ever seen, per processor
        load: Arc<StdMutex<HashMap<String, (usize, usize)>>>,
    }

    impl FakeClient {
        fn calls(&self) -> Vec<(String, String)> {
            self.calls.lock().unwrap().clone()
        }

        fn peak(&self, processor: &str) -> usize {
            self.load
                .lock()
                .unwrap()
                .get(processor)
                .map(|(_, peak)| *peak)
                .unwrap_or(0)
        }
    }

    impl ProcessorClient for FakeClient {
        fn process(
            &self,
            processor: &str,
            reference: &DocumentRef,
        ) -> impl Future<Output = std::result::Result<ProcessAck, DispatchError>> + Send {
            self.calls
                .lock()
                .unwrap()
                .push((processor.to_string(), reference.to_string()));

            let hang = self.hang.contains(processor);
            let result = if self.down.contains(processor) {
                Err(DispatchError::unavailable("connection refused"))
            } else if self.reject.contains(reference.as_str()) {
                Err(DispatchError::rejected("parse_error", "not text"))
            } else {
                Ok(ProcessAck {
                    document: reference.clone(),
                    topics: vec!["Sport".to_string()],
                    deliveries: 1,
                })
            };

            let delay = self.delay;
            let load = Arc::clone(&self.load);
            let processor = processor.to_string();
            {
                let mut load = load.lock().unwrap();
                let (current, peak) = load.entry(processor.clone()).or_default();
                *current += 1;
                *peak = (*peak).max(*current);
            }

            async move {
                if hang {
                    std::future::pending::<()>().await;
                }
                if result.is_ok() && !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                if let Some((current, _)) = load.lock().unwrap().get_mut(&processor) {
                    *current -= 1;
                }
                result
            }
        }
    }

    fn docs(names: &[&str]) -> Vec<DocumentRef> {
        names.iter().map(|n| DocumentRef::from(*n)).collect()
    }

    fn state_of(status: &QueueStatus, name: &str) -> DocumentStatus {
        status
            .documents
            .iter()
            .find(|d| d.reference.as_str() == name)
            .cloned()
            .unwrap()
    }

    #[tokio::test]
    async fn test_register_documents_ignores_duplicates() {
        let queue = WorkerQueue::with_client(FakeClient::default());

        assert_eq!(queue.register_documents(&docs(&["a", "b", "a"])).await.unwrap(), 2);
        assert_eq!(queue.register_documents(&docs(&["b", "c"])).await.unwrap(), 1);

        let status = queue.status().await;
        let order: Vec<&str> = status.documents.iter().map(|d| d.reference.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
        assert_eq!(status.phase, DispatchPhase::Idle);
    }

    #[tokio::test]
    async fn test_register_processor_is_idempotent() {
        let queue = WorkerQueue::with_client(FakeClient::default());

        assert!(queue.register_processor("http://p1").await);
        assert!(!queue.register_processor("http://p1").await);
        assert_eq!(queue.status().await.processors, 1);
    }

    #[tokio::test]
    async fn test_dispatch_without_processors_fails() {
        let queue = WorkerQueue::with_client(FakeClient::default());
        queue.register_documents(&docs(&["a"])).await.unwrap();

        let err = queue.dispatch().await.unwrap_err();
        assert_eq!(err, QueueError::NoProcessors);
        assert!(matches!(queue.status().await.phase, DispatchPhase::Failed(_)));
    }

    #[tokio::test]
    async fn test_dispatch_with_nothing_pending_is_noop() {
        let queue = WorkerQueue::with_client(FakeClient::default());

        let summary = queue.dispatch().await.unwrap();
        assert_eq!(summary, DispatchSummary::default());
        assert!(queue.client.calls().is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_round_robin() {
        let queue = WorkerQueue::with_client(FakeClient::default());
        queue.register_processor("p1").await;
        queue.register_processor("p2").await;
        queue.register_documents(&docs(&["a", "b", "c", "d"])).await.unwrap();

        let summary = queue.dispatch().await.unwrap();
        assert_eq!(summary.processed, 4);
        assert_eq!(summary.failed, 0);

        let status = queue.status().await;
        assert_eq!(status.phase, DispatchPhase::Finished);
        assert!(status.all_terminal());
        assert_eq!(state_of(&status, "a").processor.as_deref(), Some("p1"));
        assert_eq!(state_of(&status, "b").processor.as_deref(), Some("p2"));
        assert_eq!(state_of(&status, "c").processor.as_deref(), Some("p1"));
        assert_eq!(state_of(&status, "a").topics, vec!["Sport"]);
    }

    #[tokio::test]
    async fn test_unavailable_processor_is_retried_elsewhere() {
        let client = FakeClient {
            down: ["p1".to_string()].into(),
            ..Default::default()
        };
        let queue = WorkerQueue::with_client(client);
        queue.register_processor("p1").await;
        queue.register_processor("p2").await;
        queue.register_documents(&docs(&["a"])).await.unwrap();

        let summary = queue.dispatch().await.unwrap();
        assert_eq!(summary.processed, 1);

        let status = queue.status().await;
        let a = state_of(&status, "a");
        assert_eq!(a.state, DocumentState::Done);
        assert_eq!(a.attempts, 2);
        assert_eq!(a.processor.as_deref(), Some("p2"));
        assert_eq!(a.error, None);
    }

    #[tokio::test]
    async fn test_requeued_documents_respect_per_processor_limit() {
        let client = FakeClient {
            down: ["p1".to_string()].into(),
            delay: Duration::from_millis(10),
            ..Default::default()
        };
        let queue = WorkerQueue::with_client(client);
        for processor in ["p1", "p2", "p3"] {
            queue.register_processor(processor).await;
        }
        queue
            .register_documents(&docs(&["a", "b", "c", "d", "e", "f"]))
            .await
            .unwrap();

        let summary = queue.dispatch().await.unwrap();

        assert_eq!(summary.processed, 6);
        assert_eq!(queue.client.peak("p2"), 1);
        assert_eq!(queue.client.peak("p3"), 1);
        assert!(queue.status().await.all_terminal());
    }

    #[tokio::test]
    async fn test_per_processor_concurrency_allows_parallel_calls() {
        let client = FakeClient {
            delay: Duration::from_millis(20),
            ..Default::default()
        };
        let config = QueueConfig {
            per_processor_concurrency: 2,
            ..Default::default()
        };
        let queue = WorkerQueue::new(client, config);
        queue.register_processor("p1").await;
        queue.register_documents(&docs(&["a", "b", "c"])).await.unwrap();

        queue.dispatch().await.unwrap();

        assert_eq!(queue.client.peak("p1"), 2);
    }

    #[tokio::test]
    async fn test_attempts_are_bounded() {
        let client = FakeClient {
            down: ["p1".to_string()].into(),
            ..Default::default()
        };
        let queue = WorkerQueue::new(
            client,
            QueueConfig {
                max_attempts: 3,
                ..Default::default()
            },
        );
        queue.register_processor("p1").await;
        queue.register_documents(&docs(&["a"])).await.unwrap();

        let summary = queue.dispatch().await.unwrap();
        assert_eq!(summary.failed, 1);

        let a = state_of(&queue.status().await, "a");
        assert_eq!(a.state, DocumentState::Failed);
        assert_eq!(a.attempts, 3);
        assert_eq!(queue.client.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_rejected_document_is_not_retried() {
        let client = FakeClient {
            reject: ["bad".to_string()].into(),
            ..Default::default()
        };
        let queue = WorkerQueue::with_client(client);
        queue.register_processor("p1").await;
        queue.register_processor("p2").await;
        queue.register_documents(&docs(&["good", "bad"])).await.unwrap();

        let summary = queue.dispatch().await.unwrap();
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.failed, 1);

        let bad = state_of(&queue.status().await, "bad");
        assert_eq!(bad.state, DocumentState::Failed);
        assert_eq!(bad.attempts, 1);
        assert_eq!(bad.error.as_deref(), Some("parse_error: not text"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_timeout_counts_as_unavailable() {
        let client = FakeClient {
            hang: ["slow".to_string()].into(),
            ..Default::default()
        };
        let queue = WorkerQueue::new(
            client,
            QueueConfig {
                call_timeout: Duration::from_secs(5),
                ..Default::default()
            },
        );
        queue.register_processor("slow").await;
        queue.register_processor("fast").await;
        queue.register_documents(&docs(&["a"])).await.unwrap();

        queue.dispatch().await.unwrap();

        let a = state_of(&queue.status().await, "a");
        assert_eq!(a.state, DocumentState::Done);
        assert_eq!(a.processor.as_deref(), Some("fast"));
    }

    #[tokio::test]
    async fn test_documents_can_be_added_after_dispatch() {
        let queue = WorkerQueue::with_client(FakeClient::default());
        queue.register_processor("p1").await;
        queue.register_documents(&docs(&["a"])).await.unwrap();
        queue.dispatch().await.unwrap();

        queue.register_documents(&docs(&["b"])).await.unwrap();
        let summary = queue.dispatch().await.unwrap();

        assert_eq!(summary.processed, 1);
        assert!(queue.status().await.all_terminal());
    }
}
