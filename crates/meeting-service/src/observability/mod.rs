//! Observability for the meeting service: Prometheus metrics definitions.

pub mod metrics;
