//! HTTP facade over the ReelScout query pipeline.

pub mod api;
pub mod metrics;
pub mod state;
