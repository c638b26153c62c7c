//! Local Process Lifecycle
//!
//! Runs every worker as a child `docflow-node` process on the loopback
//! interface. Role configuration is passed through `DOCFLOW_*` environment
//! variables; everything else (`RUST_LOG`, `DOCFLOW_DOCUMENT_ROOT`, ...) is
//! inherited from the orchestrator's own environment.

use std::collections::HashMap;
use std::future::Future;
use std::net::TcpListener;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use docflow_domain::document::WorkerId;
use docflow_domain::orchestrator::{
    LifecycleError, WorkerEndpoint, WorkerRole, WorkerSpec, WorkerStatus,
};
use docflow_domain::ports::WorkerLifecycle;

use crate::protocol::{endpoints, env, url};

#[derive(Debug, Clone)]
pub struct ProcessLifecycleConfig {
    /// Path of the `docflow-node` executable
    pub binary: PathBuf,
    /// Address the workers bind to
    pub host: String,
    /// Timeout of a single health probe
    pub health_timeout: Duration,
}

impl ProcessLifecycleConfig {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            host: "127.0.0.1".to_string(),
            health_timeout: Duration::from_secs(2),
        }
    }

    /// Use the currently running executable as the worker binary
    pub fn current_exe() -> std::io::Result<Self> {
        Ok(Self::new(std::env::current_exe()?))
    }
}

/// Worker lifecycle backed by local child processes
#[derive(Clone)]
pub struct ProcessLifecycle {
    config: ProcessLifecycleConfig,
    http: Client,
    children: Arc<Mutex<HashMap<WorkerId, Child>>>,
}

impl ProcessLifecycle {
    pub fn new(config: ProcessLifecycleConfig) -> Self {
        Self {
            config,
            http: Client::new(),
            children: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn config(&self) -> &ProcessLifecycleConfig {
        &self.config
    }

    /// Number of children currently tracked
    pub async fn running(&self) -> usize {
        self.children.lock().await.len()
    }

    /// Let the OS pick a free port on `host`
    ///
    /// The port is released before the child binds it, so another process
    /// could take it in between; the child then fails its health check and
    /// the orchestrator retries the worker.
    fn free_port(host: &str) -> Result<u16, LifecycleError> {
        let listener = TcpListener::bind((host, 0))
            .map_err(|e| LifecycleError::spawn_failed(format!("no free port: {}", e)))?;
        let port = listener
            .local_addr()
            .map_err(|e| LifecycleError::spawn_failed(e.to_string()))?
            .port();
        Ok(port)
    }

    /// Build the command for a worker and the endpoint it will serve
    fn command(&self, spec: &WorkerSpec) -> Result<(Command, WorkerEndpoint), LifecycleError> {
        let host = &self.config.host;
        let port = Self::free_port(host)?;

        let mut command = Command::new(&self.config.binary);
        command
            .env(env::ROLE, spec.role.kind().as_str())
            .env(env::HOST, host)
            .env(env::PORT, port.to_string())
            .env(env::WORKER_NAME, &spec.name)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let mut bus = None;
        match &spec.role {
            WorkerRole::Queue => {}
            WorkerRole::Processor => {
                let bus_port = Self::free_port(host)?;
                command.env(env::BUS_PORT, bus_port.to_string());
                bus = Some(format!("{}:{}", host, bus_port));
            }
            WorkerRole::Aggregator { topic, sources } => {
                command
                    .env(env::TOPIC, topic)
                    .env(env::BUS_SOURCES, sources.join(","));
            }
        }

        let endpoint = WorkerEndpoint {
            id: WorkerId::new(spec.name.clone()),
            api: format!("http://{}:{}", host, port),
            bus,
        };
        Ok((command, endpoint))
    }
}

impl WorkerLifecycle for ProcessLifecycle {
    #[instrument(skip(self, spec), fields(worker = %spec.name, role = spec.role.kind().as_str()))]
    fn create(
        &self,
        spec: &WorkerSpec,
    ) -> impl Future<Output = Result<WorkerEndpoint, LifecycleError>> + Send {
        let prepared = self.command(spec);
        let children = Arc::clone(&self.children);

        async move {
            let (mut command, endpoint) = prepared?;

            let child = command.spawn().map_err(|e| {
                LifecycleError::spawn_failed(format!("{}: {}", endpoint.id, e))
            })?;

            info!(
                pid = child.id(),
                api = %endpoint.api,
                bus = endpoint.bus.as_deref().unwrap_or("-"),
                "Spawned worker process"
            );

            children.lock().await.insert(endpoint.id.clone(), child);
            Ok(endpoint)
        }
    }

    #[instrument(skip(self, worker), fields(worker = %worker.id))]
    fn delete(
        &self,
        worker: &WorkerEndpoint,
    ) -> impl Future<Output = Result<(), LifecycleError>> + Send {
        let children = Arc::clone(&self.children);
        let id = worker.id.clone();

        async move {
            let child = children.lock().await.remove(&id);
            let Some(mut child) = child else {
                return Err(LifecycleError::unknown_worker(id.as_str()));
            };

            // `kill` also waits for the child, so nothing is left as a zombie
            match child.kill().await {
                Ok(()) => {
                    info!("Worker process stopped");
                    Ok(())
                }
                Err(e) => {
                    warn!(error = %e, "Failed to stop worker process");
                    Err(LifecycleError::io(e.to_string()))
                }
            }
        }
    }

    fn status(
        &self,
        worker: &WorkerEndpoint,
    ) -> impl Future<Output = Result<WorkerStatus, LifecycleError>> + Send {
        let children = Arc::clone(&self.children);
        let id = worker.id.clone();
        let probe = self
            .http
            .get(url(&worker.api, endpoints::HEALTH))
            .timeout(self.config.health_timeout);

        async move {
            {
                let mut children = children.lock().await;
                let child = children
                    .get_mut(&id)
                    .ok_or_else(|| LifecycleError::unknown_worker(id.as_str()))?;

                match child.try_wait() {
                    Ok(Some(exit)) => {
                        warn!(worker = %id, exit = %exit, "Worker process exited");
                        return Ok(WorkerStatus::Failed);
                    }
                    Ok(None) => {}
                    Err(e) => return Err(LifecycleError::io(e.to_string())),
                }
            }

            match probe.send().await {
                Ok(response) if response.status().is_success() => Ok(WorkerStatus::Ready),
                Ok(response) => {
                    debug!(worker = %id, status = %response.status(), "Worker not healthy yet");
                    Ok(WorkerStatus::NotReady)
                }
                Err(e) => {
                    debug!(worker = %id, error = %e, "Worker not reachable yet");
                    Ok(WorkerStatus::NotReady)
                }
            }
        }
    }
}
