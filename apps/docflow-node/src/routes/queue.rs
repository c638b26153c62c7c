//! Worker Queue routes

use axum::{
    routing::{get, post},
    Router,
};
use docflow_adapters::protocol::endpoints;

use crate::{handlers::queue::*, state::QueueState};

pub fn routes() -> Router<QueueState> {
    Router::new()
        .route(endpoints::DOCUMENTS, post(submit_documents_handler))
        .route(endpoints::PROCESSORS, post(register_processors_handler))
        .route(endpoints::DISPATCH, post(dispatch_handler))
        .route(endpoints::STATUS, get(status_handler))
}
