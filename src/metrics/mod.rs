//! Metrics module
//!
//! Prometheus collectors describing what the audit cursor selects.

mod sampler;

pub use sampler::{AttemptLabel, SamplerMetrics, SelectionLabel};
