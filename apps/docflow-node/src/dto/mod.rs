//! Request and response bodies of the orchestrator's public API

pub mod analysis;
