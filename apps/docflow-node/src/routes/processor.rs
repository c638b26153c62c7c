//! Document Processor routes

use axum::{routing::post, Router};
use docflow_adapters::protocol::endpoints;

use crate::{handlers::processor::process_handler, state::ProcessorState};

pub fn routes() -> Router<ProcessorState> {
    Router::new().route(endpoints::PROCESS, post(process_handler))
}
