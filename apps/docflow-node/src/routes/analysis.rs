//! Orchestrator routes

use axum::{
    routing::{get, post},
    Router,
};

use crate::{
    handlers::analysis::{analyze_handler, status_handler},
    state::OrchestratorState,
};

pub fn routes() -> Router<OrchestratorState> {
    Router::new()
        .route("/analyze", post(analyze_handler))
        .route("/status", get(status_handler))
}
