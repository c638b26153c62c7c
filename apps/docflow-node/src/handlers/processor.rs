//! Document Processor handler

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use tracing::warn;

use docflow_adapters::protocol::{ErrorBody, ProcessRequest};
use docflow_domain::ProcessingError;

use crate::state::ProcessorState;

pub async fn process_handler(
    State(state): State<ProcessorState>,
    Json(payload): Json<ProcessRequest>,
) -> impl IntoResponse {
    match state.processor.process(&payload.document).await {
        Ok(ack) => (StatusCode::OK, Json(ack)).into_response(),
        Err(err) => {
            warn!(document = %payload.document, error = %err, kind = err.kind(), "Document not processed");

            let status = match &err {
                ProcessingError::ReadError { .. } | ProcessingError::ParseError { .. } => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                ProcessingError::PublishError(_) => StatusCode::SERVICE_UNAVAILABLE,
            };

            (status, Json(ErrorBody::new(err.kind(), &err))).into_response()
        }
    }
}
