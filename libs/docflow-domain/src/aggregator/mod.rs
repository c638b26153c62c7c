//! Topic Aggregator
//!
//! One aggregator owns the running metrics total for exactly one topic. It is
//! fed by the bus subscription(s) and read by the orchestrator.

mod entity;
mod service;

pub use entity::{AggregatorPhase, AggregatorSnapshot};
pub use service::TopicAggregator;
