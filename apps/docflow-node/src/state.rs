//! Application state shared across handlers, one per role

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::task::JoinHandle;
use tracing::info;

use docflow_adapters::{
    FsDocumentSource, HttpAggregatorClient, HttpProcessorClient, HttpQueueClient,
    ProcessLifecycle, ProcessLifecycleConfig,
};
use docflow_bus::BusPublisher;
use docflow_domain::{DocumentProcessor, Orchestrator, TopicAggregator, WorkerQueue};

use crate::config::NodeConfig;
use crate::feed::{spawn_feeds, FeedConfig};

/// Timeout of the orchestrator's calls into queue and aggregators
const CONTROL_TIMEOUT: Duration = Duration::from_secs(10);

pub type NodeOrchestrator = Orchestrator<ProcessLifecycle, HttpQueueClient, HttpAggregatorClient>;
pub type NodeQueue = WorkerQueue<HttpProcessorClient>;
pub type NodeProcessor = DocumentProcessor<FsDocumentSource, BusPublisher>;

#[derive(Clone)]
pub struct OrchestratorState {
    pub orchestrator: Arc<NodeOrchestrator>,
}

#[derive(Clone)]
pub struct QueueState {
    pub queue: Arc<NodeQueue>,
}

#[derive(Clone)]
pub struct ProcessorState {
    pub processor: Arc<NodeProcessor>,
}

#[derive(Clone)]
pub struct AggregatorState {
    pub aggregator: Arc<TopicAggregator>,
}

impl OrchestratorState {
    /// Orchestrator that runs its workers as child processes of this binary
    pub fn from_config(config: &NodeConfig) -> Result<Self> {
        let lifecycle_config = match &config.node_binary {
            Some(binary) => ProcessLifecycleConfig::new(binary),
            None => ProcessLifecycleConfig::current_exe()
                .context("cannot locate the docflow-node executable")?,
        };
        info!(binary = %lifecycle_config.binary.display(), "Workers run as local processes");

        let orchestrator = Orchestrator::new(
            ProcessLifecycle::new(lifecycle_config),
            HttpQueueClient::new(CONTROL_TIMEOUT),
            HttpAggregatorClient::new(CONTROL_TIMEOUT),
            config.orchestrator_config(),
        );

        Ok(Self {
            orchestrator: Arc::new(orchestrator),
        })
    }
}

impl QueueState {
    pub fn from_config(config: &NodeConfig) -> Self {
        let queue = WorkerQueue::new(
            HttpProcessorClient::new(config.call_timeout),
            config.queue_config(),
        );

        Self {
            queue: Arc::new(queue),
        }
    }
}

impl ProcessorState {
    /// Bind the bus publisher and build the processor around it
    pub async fn from_config(config: &NodeConfig) -> Result<Self> {
        let publisher = BusPublisher::bind(config.bus_addr())
            .await
            .with_context(|| format!("cannot bind bus publisher on {}", config.bus_addr()))?;

        let source = match &config.document_root {
            Some(root) => FsDocumentSource::with_root(root),
            None => FsDocumentSource::new(),
        };

        Ok(Self {
            processor: Arc::new(DocumentProcessor::new(source, publisher)),
        })
    }

    /// Address the bus publisher is bound to
    pub fn bus_addr(&self) -> SocketAddr {
        self.processor.publisher().local_addr()
    }
}

impl AggregatorState {
    /// Build the aggregator and start one bus feed per source
    pub fn from_config(config: &NodeConfig) -> Result<(Self, Vec<JoinHandle<()>>)> {
        let topic = config
            .topic
            .clone()
            .context("aggregator started without a topic")?;

        let aggregator = Arc::new(TopicAggregator::new(topic, config.bus_sources.clone()));
        let feeds = spawn_feeds(
            Arc::clone(&aggregator),
            &config.bus_sources,
            FeedConfig::default(),
        );

        Ok((Self { aggregator }, feeds))
    }
}
