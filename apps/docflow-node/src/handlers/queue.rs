//! Worker Queue handlers

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use tracing::{error, info, warn};

use docflow_adapters::protocol::{ErrorBody, RegisterProcessorsRequest, SubmitDocumentsRequest};
use docflow_domain::queue::{DispatchPhase, QueueError, QueueStatus};

use crate::state::QueueState;

fn rejection(err: &QueueError) -> (StatusCode, Json<ErrorBody>) {
    (StatusCode::CONFLICT, Json(ErrorBody::new(err.kind(), err)))
}

pub async fn submit_documents_handler(
    State(state): State<QueueState>,
    Json(payload): Json<SubmitDocumentsRequest>,
) -> impl IntoResponse {
    match state.queue.register_documents(&payload.documents).await {
        Ok(added) => {
            info!(added, submitted = payload.documents.len(), "Documents registered");
            (StatusCode::OK, Json(json!({ "added": added }))).into_response()
        }
        Err(err) => {
            warn!(error = %err, "Documents refused");
            rejection(&err).into_response()
        }
    }
}

pub async fn register_processors_handler(
    State(state): State<QueueState>,
    Json(payload): Json<RegisterProcessorsRequest>,
) -> impl IntoResponse {
    let mut added = 0;
    for processor in payload.processors {
        if state.queue.register_processor(processor).await {
            added += 1;
        }
    }

    info!(added, "Processors registered");
    (StatusCode::OK, Json(json!({ "added": added })))
}

/// Start dispatching in the background
pub async fn dispatch_handler(State(state): State<QueueState>) -> impl IntoResponse {
    if state.queue.status().await.phase == DispatchPhase::Running {
        return rejection(&QueueError::DispatchInProgress).into_response();
    }

    let queue = state.queue.clone();
    tokio::spawn(async move {
        match queue.dispatch().await {
            Ok(summary) => info!(
                processed = summary.processed,
                failed = summary.failed,
                "Dispatch finished"
            ),
            Err(err) => error!(error = %err, kind = err.kind(), "Dispatch did not run"),
        }
    });

    StatusCode::ACCEPTED.into_response()
}

pub async fn status_handler(State(state): State<QueueState>) -> Json<QueueStatus> {
    Json(state.queue.status().await)
}
