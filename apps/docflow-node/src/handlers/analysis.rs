//! Orchestrator handlers

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use tracing::{error, info, warn};

use docflow_domain::JobError;

use crate::{
    dto::analysis::{AnalyzeRequest, AnalyzeResponse, ErrorResponse, JobStatusResponse},
    state::OrchestratorState,
};

/// Run an analysis job to completion
#[utoipa::path(
    post,
    path = "/analyze",
    request_body = AnalyzeRequest,
    responses(
        (status = 200, description = "Job finished, complete or partial", body = AnalyzeResponse),
        (status = 400, description = "Invalid request - no documents, no topics or a blank topic", body = ErrorResponse),
        (status = 409, description = "Another job is already running", body = ErrorResponse),
        (status = 500, description = "Dispatch failed or the queue became unreachable", body = ErrorResponse),
        (status = 502, description = "Workers could not be provisioned", body = ErrorResponse)
    ),
    tag = "analysis"
)]
pub async fn analyze_handler(
    State(state): State<OrchestratorState>,
    Json(payload): Json<AnalyzeRequest>,
) -> impl IntoResponse {
    info!(
        documents = payload.documents.len(),
        topics = payload.topics.len(),
        "Received analysis request"
    );

    // the job runs to teardown even if the client goes away
    match Arc::clone(&state.orchestrator)
        .run_detached(payload.into())
        .await
    {
        Ok(result) => {
            info!(job_id = %result.job_id, status = ?result.status, "Analysis finished");
            (StatusCode::OK, Json(AnalyzeResponse::from(result))).into_response()
        }
        Err(err) => {
            let status = match &err {
                JobError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
                JobError::Busy => StatusCode::CONFLICT,
                JobError::ProvisioningError(_) => StatusCode::BAD_GATEWAY,
                JobError::JobFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            };

            if status.is_server_error() {
                error!(error = %err, kind = err.kind(), "Analysis failed");
            } else {
                warn!(error = %err, kind = err.kind(), "Analysis refused");
            }

            (status, Json(ErrorResponse::from(&err))).into_response()
        }
    }
}

/// Phase of the current (or last) job
#[utoipa::path(
    get,
    path = "/status",
    responses(
        (status = 200, description = "Current job phase", body = JobStatusResponse)
    ),
    tag = "analysis"
)]
pub async fn status_handler(State(state): State<OrchestratorState>) -> Json<JobStatusResponse> {
    Json(state.orchestrator.progress().await.into())
}
