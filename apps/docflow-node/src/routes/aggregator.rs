//! Topic Aggregator routes

use axum::{
    routing::{get, post},
    Router,
};
use docflow_adapters::protocol::endpoints;

use crate::{
    handlers::aggregator::{drain_handler, metrics_handler, ready_handler},
    state::AggregatorState,
};

pub fn routes() -> Router<AggregatorState> {
    Router::new()
        .route(endpoints::READY, get(ready_handler))
        .route(endpoints::METRICS, get(metrics_handler))
        .route(endpoints::DRAIN, post(drain_handler))
}
