use serde::{Deserialize, Serialize};

use crate::analytics::Metrics;

/// Lifecycle of a topic aggregator
///
/// `Subscribing → Subscribed → Accumulating → Drained`. An aggregator with no
/// bus source to wait for starts out `Subscribed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregatorPhase {
    /// Waiting for at least one bus source to acknowledge the subscription
    Subscribing,
    /// Every source acknowledged; no segment received yet
    Subscribed,
    /// At least one segment has been counted
    Accumulating,
    /// Final totals have been collected
    Drained,
}

/// Point-in-time view of an aggregator's totals
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatorSnapshot {
    pub topic: String,
    pub metrics: Metrics,
    /// Number of segments counted so far
    pub segment_count: u64,
    pub phase: AggregatorPhase,
}
