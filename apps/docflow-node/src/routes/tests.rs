//! Router tests over loopback HTTP
//!
//! Each worker router is served on `127.0.0.1:0` and driven through the real
//! HTTP clients of `docflow-adapters`. The last tests run a whole job: an
//! in-process lifecycle serves every provisioned worker from this test
//! process, with the real bus between processors and aggregators.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use axum::Router;
use tokio::task::JoinHandle;
use tempfile::TempDir;

use docflow_adapters::protocol::{endpoints, env, ErrorBody, ProcessRequest};
use docflow_adapters::{HttpAggregatorClient, HttpProcessorClient, HttpQueueClient};
use docflow_domain::orchestrator::{
    ClientError, LifecycleError, Orchestrator, OrchestratorConfig, WorkerEndpoint, WorkerRole,
    WorkerSpec, WorkerStatus,
};
use docflow_domain::ports::{AggregatorClient, ProcessorClient, QueueClient, WorkerLifecycle};
use docflow_domain::queue::DispatchPhase;
use docflow_domain::{
    AggregatorPhase, AnalysisRequest, DocumentRef, DocumentState, JobStatus, Metrics, WorkerId,
};

use super::*;
use crate::config::NodeConfig;

const TIMEOUT: Duration = Duration::from_secs(5);

/// Temporary directory holding the given documents
fn docs_dir(files: &[(&str, &[u8])]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (name, bytes) in files {
        std::fs::write(dir.path().join(name), bytes).unwrap();
    }
    dir
}

fn doc_path(dir: &TempDir, name: &str) -> String {
    dir.path().join(name).to_string_lossy().into_owned()
}

fn node_config(vars: &[(&str, &str)]) -> NodeConfig {
    let mut all: HashMap<String, String> = HashMap::from([
        (env::HOST.to_string(), "127.0.0.1".to_string()),
        (env::PORT.to_string(), "0".to_string()),
        (env::BUS_PORT.to_string(), "0".to_string()),
    ]);
    for (k, v) in vars {
        all.insert(k.to_string(), v.to_string());
    }
    NodeConfig::from_lookup(|key| all.get(key).cloned()).unwrap()
}

/// Serve `app` on a free loopback port and return its base URL
async fn serve(app: Router) -> (String, JoinHandle<()>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}", addr), handle)
}

fn endpoint(api: &str) -> WorkerEndpoint {
    WorkerEndpoint {
        id: WorkerId::from("test"),
        api: api.to_string(),
        bus: None,
    }
}

const SPORT_AND_MUSIC: &[u8] = b"# Sport\nGoal scored\n# Music\nNew album\n";
const PREAMBLE_AND_SPORT: &[u8] = b"intro\n# Sport\nMatch tonight at eight\n";

#[tokio::test]
async fn test_every_role_serves_health() {
    let (api, _server) = serve(queue_router(QueueState::from_config(&node_config(&[])))).await;

    let body = reqwest::get(format!("{}/health", api))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    assert_eq!(body, "OK");
}

#[tokio::test]
async fn test_processor_acks_and_rejects() {
    let dir = docs_dir(&[("a.md", SPORT_AND_MUSIC), ("blob.bin", &[0xff_u8, 0xfe, 0xfd][..])]);
    let state = ProcessorState::from_config(&node_config(&[])).await.unwrap();
    let (api, _server) = serve(processor_router(state)).await;
    let client = HttpProcessorClient::new(TIMEOUT);

    let ack = client
        .process(&api, &DocumentRef::new(doc_path(&dir, "a.md")))
        .await
        .unwrap();
    assert_eq!(ack.topics, vec!["Sport", "Music"]);
    assert_eq!(ack.deliveries, 0);

    let err = client
        .process(&api, &DocumentRef::new(doc_path(&dir, "blob.bin")))
        .await
        .unwrap_err();
    assert!(!err.is_retryable());

    // raw wire shape of a rejection
    let response = reqwest::Client::new()
        .post(format!("{}{}", api, endpoints::PROCESS))
        .json(&ProcessRequest {
            document: DocumentRef::new(doc_path(&dir, "missing.md")),
        })
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 422);
    let body: ErrorBody = response.json().await.unwrap();
    assert_eq!(body.kind, "read_error");
}

#[tokio::test]
async fn test_queue_dispatches_to_registered_processor() {
    let dir = docs_dir(&[("a.md", SPORT_AND_MUSIC), ("b.md", PREAMBLE_AND_SPORT)]);

    let processor = ProcessorState::from_config(&node_config(&[])).await.unwrap();
    let (processor_api, _p) = serve(processor_router(processor)).await;
    let (queue_api, _q) = serve(queue_router(QueueState::from_config(&node_config(&[])))).await;

    let queue = endpoint(&queue_api);
    let client = HttpQueueClient::new(TIMEOUT);

    client.register_processors(&queue, &[processor_api]).await.unwrap();
    client
        .submit_documents(
            &queue,
            &[
                DocumentRef::new(doc_path(&dir, "a.md")),
                DocumentRef::new(doc_path(&dir, "b.md")),
                DocumentRef::new(doc_path(&dir, "missing.md")),
            ],
        )
        .await
        .unwrap();
    client.start_dispatch(&queue).await.unwrap();

    let mut status = client.status(&queue).await.unwrap();
    for _ in 0..200 {
        if status.phase == DispatchPhase::Finished {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        status = client.status(&queue).await.unwrap();
    }

    assert_eq!(status.phase, DispatchPhase::Finished);
    assert_eq!(status.processors, 1);
    assert_eq!(status.count(DocumentState::Done), 2);
    assert_eq!(status.count(DocumentState::Failed), 1);
}

#[tokio::test]
async fn test_queue_refuses_documents_while_dispatching() {
    // processor that never answers, so dispatch stays running
    let silent = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let silent_api = format!("http://{}", silent.local_addr().unwrap());

    let (queue_api, _q) = serve(queue_router(QueueState::from_config(&node_config(&[])))).await;
    let queue = endpoint(&queue_api);
    let client = HttpQueueClient::new(TIMEOUT);

    client.register_processors(&queue, &[silent_api]).await.unwrap();
    client.submit_documents(&queue, &["a.md".into()]).await.unwrap();
    client.start_dispatch(&queue).await.unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;

    let err = client
        .submit_documents(&queue, &["b.md".into()])
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Rejected { status: 409, .. }));

    drop(silent);
}

#[tokio::test]
async fn test_aggregator_without_sources_is_ready_and_drains() {
    let config = node_config(&[(env::ROLE, "aggregator"), (env::TOPIC, "Sport")]);
    let (state, _feeds) = AggregatorState::from_config(&config).unwrap();
    let (api, _server) = serve(aggregator_router(state)).await;

    let aggregator = endpoint(&api);
    let client = HttpAggregatorClient::new(TIMEOUT);

    assert!(client.is_subscribed(&aggregator).await.unwrap());

    let metrics = client.metrics(&aggregator).await.unwrap();
    assert_eq!(metrics.topic, "Sport");
    assert_eq!(metrics.metrics, Metrics::zero());

    let drained = client.drain(&aggregator).await.unwrap();
    assert_eq!(drained.phase, AggregatorPhase::Drained);
}

#[tokio::test]
async fn test_orchestrator_rejects_invalid_request() {
    let config = node_config(&[(env::NODE_BINARY, "/nonexistent/docflow-node")]);
    let (api, _server) = serve(orchestrator_router(
        OrchestratorState::from_config(&config).unwrap(),
    ))
    .await;
    let http = reqwest::Client::new();

    let response = http
        .post(format!("{}/analyze", api))
        .json(&serde_json::json!({ "documents": ["a.md"], "topics": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["kind"], "invalid_request");

    let status: serde_json::Value = http
        .get(format!("{}/status", api))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["phase"], "idle");

    let docs = http
        .get(format!("{}/api-docs/openapi.json", api))
        .send()
        .await
        .unwrap();
    assert!(docs.status().is_success());
}

#[test]
fn test_package_metadata_comes_from_workspace() {
    assert_eq!(env!("CARGO_PKG_AUTHORS"), "docflow contributors");
    assert!(env!("CARGO_PKG_REPOSITORY").starts_with("https://"));
    assert_eq!(env!("CARGO_PKG_LICENSE"), "Apache-2.0");
}

#[tokio::test]
async fn test_orchestrator_reports_provisioning_failure() {
    let config = node_config(&[
        (env::NODE_BINARY, "/nonexistent/docflow-node"),
        (env::PROVISION_ATTEMPTS, "1"),
    ]);
    let (api, _server) = serve(orchestrator_router(
        OrchestratorState::from_config(&config).unwrap(),
    ))
    .await;

    let response = reqwest::Client::new()
        .post(format!("{}/analyze", api))
        .json(&serde_json::json!({ "documents": ["a.md"], "topics": ["Sport"] }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 502);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["kind"], "provisioning_error");
}

/// Lifecycle serving every worker from the test process
#[derive(Default)]
struct InProcessLifecycle {
    workers: Mutex<HashMap<WorkerId, JoinHandle<()>>>,
}

impl InProcessLifecycle {
    async fn start(&self, spec: &WorkerSpec) -> Result<WorkerEndpoint, LifecycleError> {
        let fail = |e: anyhow::Error| LifecycleError::spawn_failed(e.to_string());

        let mut bus = None;
        let app = match &spec.role {
            WorkerRole::Queue => queue_router(QueueState::from_config(&node_config(&[]))),
            WorkerRole::Processor => {
                let state = ProcessorState::from_config(&node_config(&[]))
                    .await
                    .map_err(fail)?;
                bus = Some(state.bus_addr().to_string());
                processor_router(state)
            }
            WorkerRole::Aggregator { topic, sources } => {
                let sources = sources.join(",");
                let config = node_config(&[
                    (env::ROLE, "aggregator"),
                    (env::TOPIC, topic.as_str()),
                    (env::BUS_SOURCES, sources.as_str()),
                ]);
                let (state, _feeds) = AggregatorState::from_config(&config).map_err(fail)?;
                aggregator_router(state)
            }
        };

        let (api, handle) = serve(app).await;
        let id = WorkerId::new(spec.name.clone());
        self.workers.lock().unwrap().insert(id.clone(), handle);

        Ok(WorkerEndpoint { id, api, bus })
    }
}

impl WorkerLifecycle for InProcessLifecycle {
    fn create(
        &self,
        spec: &WorkerSpec,
    ) -> impl Future<Output = Result<WorkerEndpoint, LifecycleError>> + Send {
        self.start(spec)
    }

    fn delete(
        &self,
        worker: &WorkerEndpoint,
    ) -> impl Future<Output = Result<(), LifecycleError>> + Send {
        let handle = self.workers.lock().unwrap().remove(&worker.id);
        let result = match handle {
            Some(handle) => {
                // dropping the router drops the processor's bus publisher too
                handle.abort();
                Ok(())
            }
            None => Err(LifecycleError::unknown_worker(worker.id.as_str())),
        };
        async move { result }
    }

    fn status(
        &self,
        _worker: &WorkerEndpoint,
    ) -> impl Future<Output = Result<WorkerStatus, LifecycleError>> + Send {
        async { Ok(WorkerStatus::Ready) }
    }
}

fn in_process_orchestrator(
) -> Orchestrator<InProcessLifecycle, HttpQueueClient, HttpAggregatorClient> {
    Orchestrator::new(
        InProcessLifecycle::default(),
        HttpQueueClient::new(TIMEOUT),
        HttpAggregatorClient::new(TIMEOUT),
        OrchestratorConfig {
            provision_backoff: Duration::from_millis(10),
            readiness_poll_interval: Duration::from_millis(10),
            subscription_timeout: TIMEOUT,
            settle_delay: Duration::from_millis(50),
            poll_interval: Duration::from_millis(20),
            job_timeout: Duration::from_secs(20),
            ..Default::default()
        },
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_job_over_http_and_bus() {
    let dir = docs_dir(&[("a.md", SPORT_AND_MUSIC), ("b.md", PREAMBLE_AND_SPORT)]);
    let orchestrator = in_process_orchestrator();

    let result = orchestrator
        .run_analysis(AnalysisRequest::new(
            [doc_path(&dir, "a.md"), doc_path(&dir, "b.md")],
            ["Sport"],
        ))
        .await
        .unwrap();

    assert_eq!(result.status, JobStatus::Complete);
    assert_eq!(result.metrics.len(), 1);
    assert_eq!(result.metrics["Sport"], Metrics::new(4, 10, 47));
    assert!(result.missing_topics.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_partial_job_over_http_and_bus() {
    let dir = docs_dir(&[
        ("a.md", SPORT_AND_MUSIC),
        ("b.md", PREAMBLE_AND_SPORT),
        ("blob.bin", &[0xff_u8, 0xfe, 0xfd][..]),
    ]);
    let orchestrator = in_process_orchestrator();

    let result = orchestrator
        .run_analysis(AnalysisRequest::new(
            [doc_path(&dir, "a.md"), doc_path(&dir, "blob.bin"), doc_path(&dir, "b.md")],
            ["Sport", "Music"],
        ))
        .await
        .unwrap();

    assert_eq!(result.status, JobStatus::Partial);
    assert_eq!(result.metrics["Sport"], Metrics::new(4, 10, 47));
    assert_eq!(result.metrics["Music"], Metrics::new(2, 4, 16));

    let blob = &result.documents[&DocumentRef::new(doc_path(&dir, "blob.bin"))];
    assert_eq!(blob.state, DocumentState::Failed);
}
