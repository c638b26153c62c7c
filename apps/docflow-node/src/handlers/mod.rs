//! HTTP handlers, one module per role

pub mod aggregator;
pub mod analysis;
pub mod processor;
pub mod queue;
