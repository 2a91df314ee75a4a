//! Tracing integration for structured logging and spans.

use tracing::{Level, Span, span};

/// Create a span for a pipeline's lifetime.
///
/// # Example
///
/// ```rust
/// use padweave::observability::span_pipeline;
///
/// let span = span_pipeline("remux");
/// let _guard = span.enter();
/// ```
#[inline]
pub fn span_pipeline(name: &str) -> Span {
    span!(Level::INFO, "pipeline", name = %name)
}

/// Create a span for building one dynamic branch.
#[inline]
pub fn span_branch(pipeline: &str, class: &str, pad: &str) -> Span {
    span!(
        Level::DEBUG,
        "branch",
        pipeline = %pipeline,
        class = %class,
        pad = %pad
    )
}

/// Enter a pipeline span, returning the guard.
pub fn instrument_pipeline(name: &str) -> tracing::span::EnteredSpan {
    span_pipeline(name).entered()
}

/// Log a node lifecycle step.
#[inline]
pub fn trace_state_step(node: &str, from: &str, to: &str) {
    tracing::debug!(node = %node, from = %from, to = %to, "state step");
}

/// Log pipeline target state change.
#[inline]
pub fn trace_target_change(pipeline: &str, from: &str, to: &str) {
    tracing::info!(
        pipeline = %pipeline,
        from = %from,
        to = %to,
        "pipeline target state changed"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_creation() {
        let _span = span_pipeline("remux");
        let _span = span_branch("remux", "audio", "decodebin0:src_0");
    }

    #[test]
    fn test_instrumentation() {
        let _guard = instrument_pipeline("remux");
        trace_state_step("queue0", "Null", "Ready");
        trace_target_change("remux", "Null", "Playing");
    }
}
