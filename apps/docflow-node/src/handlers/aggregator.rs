//! Topic Aggregator handlers

use axum::{extract::State, Json};
use tracing::info;

use docflow_adapters::protocol::ReadyResponse;
use docflow_domain::AggregatorSnapshot;

use crate::state::AggregatorState;

pub async fn ready_handler(State(state): State<AggregatorState>) -> Json<ReadyResponse> {
    Json(ReadyResponse {
        topic: state.aggregator.topic().to_string(),
        ready: state.aggregator.is_ready().await,
    })
}

pub async fn metrics_handler(State(state): State<AggregatorState>) -> Json<AggregatorSnapshot> {
    Json(state.aggregator.metrics().await)
}

pub async fn drain_handler(State(state): State<AggregatorState>) -> Json<AggregatorSnapshot> {
    let snapshot = state.aggregator.drain().await;
    info!(
        topic = %snapshot.topic,
        segments = snapshot.segment_count,
        "Aggregator drained"
    );
    Json(snapshot)
}
