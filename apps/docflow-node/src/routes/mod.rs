//! API routes
//!
//! Every role serves `/health`. Only the orchestrator's API is public and
//! documented with OpenAPI; the worker APIs are internal to a job.

pub mod aggregator;
pub mod analysis;
pub mod processor;
pub mod queue;

use axum::{routing::get, Router};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    dto::analysis::{
        AnalyzeRequest, AnalyzeResponse, DocumentOutcomeResponse, ErrorResponse,
        JobStatusResponse, MetricsResponse,
    },
    handlers,
    state::{AggregatorState, OrchestratorState, ProcessorState, QueueState},
};

/// OpenAPI documentation structure
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::analysis::analyze_handler,
        handlers::analysis::status_handler,
        health_handler
    ),
    components(
        schemas(
            AnalyzeRequest,
            AnalyzeResponse,
            MetricsResponse,
            DocumentOutcomeResponse,
            JobStatusResponse,
            ErrorResponse
        )
    ),
    tags(
        (name = "analysis", description = "Document analysis jobs"),
        (name = "health", description = "Health check endpoints")
    ),
    info(
        title = "docflow API",
        version = "0.1.0",
        description = "Topic metrics over Markdown documents, computed by workers provisioned per job"
    )
)]
pub struct ApiDoc;

pub fn orchestrator_router(state: OrchestratorState) -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(analysis::routes())
        .route("/health", get(health_handler))
        .with_state(state)
}

pub fn queue_router(state: QueueState) -> Router {
    Router::new()
        .merge(queue::routes())
        .route("/health", get(health_handler))
        .with_state(state)
}

pub fn processor_router(state: ProcessorState) -> Router {
    Router::new()
        .merge(processor::routes())
        .route("/health", get(health_handler))
        .with_state(state)
}

pub fn aggregator_router(state: AggregatorState) -> Router {
    Router::new()
        .merge(aggregator::routes())
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = String)
    ),
    tag = "health"
)]
async fn health_handler() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests;
