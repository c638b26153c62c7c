//! docflow node
//!
//! One binary for every service of the pipeline. `DOCFLOW_ROLE` selects what
//! this process runs:
//!
//! - `orchestrator`: public API; provisions the other roles per job
//! - `queue`: Worker Queue
//! - `processor`: Document Processor, publishing on the broadcast bus
//! - `aggregator`: Topic Aggregator for `DOCFLOW_TOPIC`

mod config;
mod dto;
mod feed;
mod handlers;
mod routes;
mod state;

use anyhow::{Context, Result};
use axum::Router;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, NodeConfig, Role};
use crate::state::{AggregatorState, OrchestratorState, ProcessorState, QueueState};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = NodeConfig::from_env()?;
    init_tracing(config.log_format);

    info!(
        role = config.role.as_str(),
        worker = config.worker_name.as_deref().unwrap_or("-"),
        "Starting docflow node"
    );

    let app = match config.role {
        Role::Orchestrator => routes::orchestrator_router(OrchestratorState::from_config(&config)?),
        Role::Queue => routes::queue_router(QueueState::from_config(&config)),
        Role::Processor => {
            let state = ProcessorState::from_config(&config).await?;
            info!(bus = %state.bus_addr(), "Bus publisher listening");
            routes::processor_router(state)
        }
        Role::Aggregator => {
            // feeds end on their own when their publisher goes away
            let (state, _feeds) = AggregatorState::from_config(&config)?;
            info!(
                topic = state.aggregator.topic(),
                sources = config.bus_sources.len(),
                "Subscribing to bus sources"
            );
            routes::aggregator_router(state)
        }
    };

    serve(&config.addr(), app).await
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

async fn serve(addr: &str, app: Router) -> Result<()> {
    info!(addr = %addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("cannot bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
