//! Metrics collection using metrics-rs.

use metrics::{Counter, Histogram, Unit, counter, histogram};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// Whether metrics have been initialized.
static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

// Metric names as constants for consistency
const NODES_ADDED: &str = "padweave_nodes_added";
const BRANCHES_BUILT: &str = "padweave_branches_built";
const BRANCH_FAILURES: &str = "padweave_branch_failures";
const STREAMS_UNCLASSIFIED: &str = "padweave_streams_unclassified";
const BUS_EVENTS: &str = "padweave_bus_events";
const BRANCH_BUILD_TIME_NS: &str = "padweave_branch_build_time_ns";

/// Initialize metrics descriptions.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init_metrics() {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        return;
    }

    metrics::describe_counter!(
        NODES_ADDED,
        Unit::Count,
        "Nodes inserted into a pipeline graph"
    );
    metrics::describe_counter!(
        BRANCHES_BUILT,
        Unit::Count,
        "Dynamic branches built and attached to the multiplexer"
    );
    metrics::describe_counter!(
        BRANCH_FAILURES,
        Unit::Count,
        "Dynamic branches that failed to build, synchronize or attach"
    );
    metrics::describe_counter!(
        STREAMS_UNCLASSIFIED,
        Unit::Count,
        "Discovered streams whose caps matched no media class"
    );
    metrics::describe_counter!(BUS_EVENTS, Unit::Count, "Events posted on a pipeline bus");
    metrics::describe_histogram!(
        BRANCH_BUILD_TIME_NS,
        Unit::Nanoseconds,
        "Time from stream discovery to branch attached"
    );
}

/// Record nodes added to a graph.
#[inline]
pub fn record_nodes_added(kind: &str, count: u64) {
    counter!(NODES_ADDED, "kind" => kind.to_string()).increment(count);
}

/// Record an event posted on a bus.
#[inline]
pub fn record_bus_event(label: &'static str) {
    counter!(BUS_EVENTS, "event" => label).increment(1);
}

/// Branch metrics for one pipeline.
///
/// Counters are registered once with the pipeline label attached.
#[derive(Clone)]
pub struct PipelineMetrics {
    name: String,
    unclassified: Counter,
    build_time: Histogram,
}

impl PipelineMetrics {
    /// Create a new pipeline metrics collector.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            unclassified: counter!(STREAMS_UNCLASSIFIED, "pipeline" => name.to_string()),
            build_time: histogram!(BRANCH_BUILD_TIME_NS, "pipeline" => name.to_string()),
        }
    }

    /// Record a branch attached for `class`.
    #[inline]
    pub fn record_branch_built(&self, class: &'static str) {
        counter!(BRANCHES_BUILT, "pipeline" => self.name.clone(), "class" => class).increment(1);
    }

    /// Record a branch that failed at `stage` ("create", "sync", "attach").
    #[inline]
    pub fn record_branch_failure(&self, class: &'static str, stage: &'static str) {
        counter!(
            BRANCH_FAILURES,
            "pipeline" => self.name.clone(),
            "class" => class,
            "stage" => stage
        )
        .increment(1);
    }

    /// Record a stream no class matched.
    #[inline]
    pub fn record_unclassified(&self) {
        self.unclassified.increment(1);
    }

    /// Start a timer that records branch build time on drop.
    pub fn start_branch_timer(&self) -> TimerGuard<'_> {
        TimerGuard {
            start: Instant::now(),
            metrics: self,
        }
    }

    /// Get the pipeline name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for PipelineMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineMetrics")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Guard that records branch build time when dropped.
pub struct TimerGuard<'a> {
    start: Instant,
    metrics: &'a PipelineMetrics,
}

impl Drop for TimerGuard<'_> {
    fn drop(&mut self) {
        self.metrics
            .build_time
            .record(self.start.elapsed().as_nanos() as f64);
    }
}
