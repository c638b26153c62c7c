//! Node configuration from environment variables

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use docflow_adapters::protocol::env;
use docflow_domain::orchestrator::OrchestratorConfig;
use docflow_domain::queue::QueueConfig;

/// Which service this process runs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Orchestrator,
    Queue,
    Processor,
    Aggregator,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Orchestrator => "orchestrator",
            Self::Queue => "queue",
            Self::Processor => "processor",
            Self::Aggregator => "aggregator",
        }
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "orchestrator" => Ok(Self::Orchestrator),
            "queue" => Ok(Self::Queue),
            "processor" => Ok(Self::Processor),
            "aggregator" => Ok(Self::Aggregator),
            other => Err(anyhow!("unknown role '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub role: Role,
    pub host: String,
    pub port: u16,
    /// Bus publisher port (processor)
    pub bus_port: u16,
    /// Topic to aggregate (aggregator)
    pub topic: Option<String>,
    /// Bus publishers to subscribe to (aggregator)
    pub bus_sources: Vec<String>,
    /// Directory documents are resolved against (processor)
    pub document_root: Option<PathBuf>,
    pub call_timeout: Duration,
    pub max_attempts: u32,
    pub max_processors: usize,
    pub job_timeout: Duration,
    pub settle_delay: Duration,
    pub provision_attempts: u32,
    /// Worker executable (orchestrator); defaults to the running binary
    pub node_binary: Option<PathBuf>,
    pub log_format: LogFormat,
    pub worker_name: Option<String>,
}

impl NodeConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let role = match var(env::ROLE) {
            Some(role) => role.parse()?,
            None => Role::Orchestrator,
        };

        let topic = var(env::TOPIC);
        if role == Role::Aggregator && topic.is_none() {
            bail!("{} is required for the aggregator role", env::TOPIC);
        }

        let bus_sources = var(env::BUS_SOURCES)
            .map(|s| {
                s.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let log_format = match var(env::LOG_FORMAT).as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };

        Ok(Self {
            role,
            host: var(env::HOST).unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&var, env::PORT, 8080)?,
            bus_port: parse_or(&var, env::BUS_PORT, 8081)?,
            topic,
            bus_sources,
            document_root: var(env::DOCUMENT_ROOT).map(PathBuf::from),
            call_timeout: Duration::from_secs(parse_or(&var, env::CALL_TIMEOUT_SECS, 30)?),
            max_attempts: parse_or(&var, env::MAX_ATTEMPTS, 3)?,
            max_processors: parse_or(&var, env::MAX_PROCESSORS, 4)?,
            job_timeout: Duration::from_secs(parse_or(&var, env::JOB_TIMEOUT_SECS, 600)?),
            settle_delay: Duration::from_millis(parse_or(&var, env::SETTLE_DELAY_MS, 200)?),
            provision_attempts: parse_or(&var, env::PROVISION_ATTEMPTS, 3)?,
            node_binary: var(env::NODE_BINARY).map(PathBuf::from),
            log_format,
            worker_name: var(env::WORKER_NAME),
        })
    }

    /// Address of the HTTP API
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Address of the bus publisher
    pub fn bus_addr(&self) -> String {
        format!("{}:{}", self.host, self.bus_port)
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            max_processors: self.max_processors.max(1),
            provision_attempts: self.provision_attempts.max(1),
            settle_delay: self.settle_delay,
            job_timeout: self.job_timeout,
            ..OrchestratorConfig::default()
        }
    }

    pub fn queue_config(&self) -> QueueConfig {
        QueueConfig {
            max_attempts: self.max_attempts.max(1),
            call_timeout: self.call_timeout,
            ..QueueConfig::default()
        }
    }
}

fn parse_or<T>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(key) {
        Some(value) => value
            .parse()
            .with_context(|| format!("invalid value '{}' for {}", value, key)),
        None => Ok(default),
    }
}
