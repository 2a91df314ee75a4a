//! The control loop watching the pipeline bus.
//!
//! ```text
//! Idle ──run()──▶ Running ──EOS / Error / cancel──▶ Draining ──teardown──▶ Stopped
//!                   │  ▲
//!                   └──┘ other events, tolerated branch errors
//! ```

use crate::error::RunError;
use crate::pipeline::events::{BusEvent, BusWatch, ErrorMessage};
use std::future::Future;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, trace, warn};

/// Run phase of the bus supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    /// Not started.
    Idle,
    /// Waiting for events.
    Running,
    /// A terminal condition was seen; teardown in progress.
    Draining,
    /// Finished. Terminal.
    Stopped,
}

/// What to do with errors that concern a single dynamic branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Any error stops the pipeline.
    #[default]
    Abort,
    /// Classification and branch construction errors are logged and kept;
    /// the pipeline keeps running.
    Continue,
}

/// Why the run loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationReason {
    /// End of stream was reached.
    EndOfStream,
    /// An error was posted.
    Error(ErrorMessage),
    /// The run was cancelled from outside.
    Cancelled,
}

impl TerminationReason {
    /// Whether the run ended with an error.
    pub fn is_error(&self) -> bool {
        matches!(self, TerminationReason::Error(_))
    }
}

/// Consumes bus events until a terminal condition.
#[derive(Debug)]
pub struct BusSupervisor {
    state: SupervisorState,
    policy: FailurePolicy,
    watch: Option<BusWatch>,
    tolerated: Vec<ErrorMessage>,
    reason: Option<TerminationReason>,
}

impl BusSupervisor {
    /// Create a supervisor consuming `watch`.
    pub fn new(watch: BusWatch, policy: FailurePolicy) -> Self {
        Self {
            state: SupervisorState::Idle,
            policy,
            watch: Some(watch),
            tolerated: Vec::new(),
            reason: None,
        }
    }

    /// Current phase.
    pub fn state(&self) -> SupervisorState {
        self.state
    }

    /// Branch errors tolerated under [`FailurePolicy::Continue`].
    pub fn tolerated(&self) -> &[ErrorMessage] {
        &self.tolerated
    }

    /// Recorded termination reason, once stopped.
    pub fn reason(&self) -> Option<&TerminationReason> {
        self.reason.as_ref()
    }

    /// Stop without running, for a pipeline that never started.
    pub(crate) fn stop(&mut self) {
        self.state = SupervisorState::Stopped;
    }

    /// Run until end of stream, a fatal error, or cancellation.
    ///
    /// `teardown` runs exactly once whatever ended the loop, including a
    /// closed bus. A stopped supervisor cannot be run again.
    pub async fn run<F, Fut>(
        &mut self,
        cancel: CancellationToken,
        teardown: F,
    ) -> Result<TerminationReason, RunError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = ()>,
    {
        if self.state == SupervisorState::Stopped {
            return Err(RunError::AlreadyStopped);
        }
        let mut watch = self.watch.take().ok_or(RunError::WatchTaken)?;
        self.state = SupervisorState::Running;

        let outcome = loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("pipeline cancelled");
                    break Ok(TerminationReason::Cancelled);
                }
                event = watch.recv() => event,
            };

            let Some(event) = event else {
                warn!("bus closed before end of stream");
                break Err(RunError::BusClosed);
            };
            if let Some(reason) = self.on_event(event) {
                break Ok(reason);
            }
        };

        self.state = SupervisorState::Draining;
        teardown().await;
        self.state = SupervisorState::Stopped;

        if let Ok(reason) = &outcome {
            self.reason = Some(reason.clone());
        }
        outcome
    }

    /// Apply one event; returns the termination reason if it is terminal.
    fn on_event(&mut self, event: BusEvent) -> Option<TerminationReason> {
        match event {
            BusEvent::Eos { source } => {
                info!(source = ?source, "end of stream");
                Some(TerminationReason::EndOfStream)
            }
            BusEvent::Error(msg)
                if msg.kind.is_branch_failure() && self.policy == FailurePolicy::Continue =>
            {
                warn!(
                    source = ?msg.source,
                    code = msg.kind.code(),
                    debug = ?msg.debug,
                    "tolerated branch failure: {}",
                    msg.message
                );
                self.tolerated.push(msg);
                None
            }
            BusEvent::Error(msg) => {
                error!(
                    source = ?msg.source,
                    code = msg.kind.code(),
                    "{}",
                    msg.message
                );
                if let Some(detail) = &msg.debug {
                    error!("debugging info: {}", detail);
                }
                Some(TerminationReason::Error(msg))
            }
            BusEvent::Warning(msg) => {
                warn!(source = ?msg.source, debug = ?msg.debug, "{}", msg.message);
                None
            }
            other => {
                trace!(event = %other, "bus event");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::LifecycleState;
    use crate::pipeline::events::{Bus, ErrorKind};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn classification_error() -> BusEvent {
        BusEvent::Error(ErrorMessage::new(
            ErrorKind::StreamClassificationFailed,
            "could not detect media stream type",
        ))
    }

    fn counting_teardown(count: &Arc<AtomicUsize>) -> impl FnOnce() -> std::future::Ready<()> {
        let count = Arc::clone(count);
        move || {
            count.fetch_add(1, Ordering::SeqCst);
            std::future::ready(())
        }
    }

    #[tokio::test]
    async fn test_eos_stops() {
        let (bus, watch) = Bus::channel();
        let mut supervisor = BusSupervisor::new(watch, FailurePolicy::Abort);
        let teardowns = Arc::new(AtomicUsize::new(0));

        bus.post(BusEvent::StateChanged {
            node: "queue0".into(),
            from: LifecycleState::Null,
            to: LifecycleState::Ready,
        });
        bus.post_eos(Some("decodebin0".into()));

        let reason = supervisor
            .run(CancellationToken::new(), counting_teardown(&teardowns))
            .await
            .unwrap();
        assert_eq!(reason, TerminationReason::EndOfStream);
        assert_eq!(supervisor.state(), SupervisorState::Stopped);
        assert_eq!(supervisor.reason(), Some(&TerminationReason::EndOfStream));
        assert_eq!(teardowns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_abort_policy_stops_on_branch_error() {
        let (bus, watch) = Bus::channel();
        let mut supervisor = BusSupervisor::new(watch, FailurePolicy::Abort);

        bus.post(classification_error());
        bus.post_eos(None);

        let reason = supervisor
            .run(CancellationToken::new(), || async {})
            .await
            .unwrap();
        match reason {
            TerminationReason::Error(msg) => {
                assert_eq!(msg.kind, ErrorKind::StreamClassificationFailed)
            }
            other => panic!("unexpected reason {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_error_with_debug_detail_stops() {
        let (bus, watch) = Bus::channel();
        let mut supervisor = BusSupervisor::new(watch, FailurePolicy::Abort);

        bus.post(BusEvent::Error(
            ErrorMessage::new(ErrorKind::Element { code: 3 }, "read failed")
                .with_source("filesrc0")
                .with_debug("short read at offset 4096"),
        ));

        let reason = supervisor
            .run(CancellationToken::new(), || async {})
            .await
            .unwrap();
        let TerminationReason::Error(msg) = reason else {
            panic!("expected an error, got {reason:?}");
        };
        assert_eq!(msg.debug.as_deref(), Some("short read at offset 4096"));
        assert_eq!(supervisor.state(), SupervisorState::Stopped);
    }

    #[tokio::test]
    async fn test_continue_policy_tolerates_branch_error() {
        let (bus, watch) = Bus::channel();
        let mut supervisor = BusSupervisor::new(watch, FailurePolicy::Continue);

        bus.post(classification_error());
        bus.post_eos(None);

        let reason = supervisor
            .run(CancellationToken::new(), || async {})
            .await
            .unwrap();
        assert_eq!(reason, TerminationReason::EndOfStream);
        assert_eq!(supervisor.tolerated().len(), 1);
    }

    #[tokio::test]
    async fn test_continue_policy_still_stops_on_element_error() {
        let (bus, watch) = Bus::channel();
        let mut supervisor = BusSupervisor::new(watch, FailurePolicy::Continue);

        bus.post_error(
            ErrorMessage::new(ErrorKind::Element { code: 9 }, "read failed")
                .with_source("filesrc0")
                .with_debug("short read"),
        );

        let reason = supervisor
            .run(CancellationToken::new(), || async {})
            .await
            .unwrap();
        assert!(reason.is_error());
        assert!(supervisor.tolerated().is_empty());
    }

    #[tokio::test]
    async fn test_cancellation() {
        let (_bus, watch) = Bus::channel();
        let mut supervisor = BusSupervisor::new(watch, FailurePolicy::Abort);
        let cancel = CancellationToken::new();
        let teardowns = Arc::new(AtomicUsize::new(0));

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let reason = supervisor
            .run(cancel, counting_teardown(&teardowns))
            .await
            .unwrap();
        assert_eq!(reason, TerminationReason::Cancelled);
        assert_eq!(teardowns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stopped_is_terminal() {
        let (bus, watch) = Bus::channel();
        let mut supervisor = BusSupervisor::new(watch, FailurePolicy::Abort);
        bus.post_eos(None);

        supervisor
            .run(CancellationToken::new(), || async {})
            .await
            .unwrap();
        let err = supervisor
            .run(CancellationToken::new(), || async {})
            .await
            .unwrap_err();
        assert_eq!(err, RunError::AlreadyStopped);
    }

    #[tokio::test]
    async fn test_closed_bus_still_tears_down() {
        let (bus, watch) = Bus::channel();
        let mut supervisor = BusSupervisor::new(watch, FailurePolicy::Abort);
        let teardowns = Arc::new(AtomicUsize::new(0));
        drop(bus);

        let err = supervisor
            .run(CancellationToken::new(), counting_teardown(&teardowns))
            .await
            .unwrap_err();
        assert_eq!(err, RunError::BusClosed);
        assert_eq!(teardowns.load(Ordering::SeqCst), 1);
        assert_eq!(supervisor.state(), SupervisorState::Stopped);
    }
}
