//! Observability features: metrics and tracing.
//!
//! ## Metrics
//!
//! padweave exposes the following metrics through the `metrics` facade. Install
//! any recorder (prometheus, statsd, ...) to collect them.
//!
//! | Metric | Type | Description |
//! |--------|------|-------------|
//! | `padweave_nodes_added` | Counter | Nodes inserted, by kind |
//! | `padweave_branches_built` | Counter | Branches attached, by pipeline and class |
//! | `padweave_branch_failures` | Counter | Branch failures, by class and stage |
//! | `padweave_streams_unclassified` | Counter | Streams no class matched |
//! | `padweave_bus_events` | Counter | Bus events posted, by event |
//! | `padweave_branch_build_time_ns` | Histogram | Discovery to attached |
//!
//! ## Tracing
//!
//! Spans are emitted for the pipeline run loop and for every branch build.

mod metrics;
mod tracing_support;

pub use metrics::{
    PipelineMetrics, TimerGuard, init_metrics, record_bus_event, record_nodes_added,
};
pub use tracing_support::{
    instrument_pipeline, span_branch, span_pipeline, trace_state_step, trace_target_change,
};
