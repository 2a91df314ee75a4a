//! The interface the orchestrator uses to drive opaque elements.

use crate::element::{PadEmitter, PadTemplate};
use crate::error::CreationError;
use crate::pipeline::parser::PropertyValue;
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

// ============================================================================
// Lifecycle
// ============================================================================

/// Run phase of a node or of the whole pipeline.
///
/// States are ordered; transitions move one step at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum LifecycleState {
    /// Initial state, no resources held.
    #[default]
    Null,
    /// Resources allocated, not processing.
    Ready,
    /// Prerolled, data may flow but the clock is stopped.
    Paused,
    /// Processing data.
    Playing,
}

impl LifecycleState {
    /// The state one step from `self` toward `target`, or `None` if already there.
    pub fn next_toward(self, target: LifecycleState) -> Option<LifecycleState> {
        use LifecycleState::*;
        match self.cmp(&target) {
            std::cmp::Ordering::Equal => None,
            std::cmp::Ordering::Less => Some(match self {
                Null => Ready,
                Ready => Paused,
                Paused | Playing => Playing,
            }),
            std::cmp::Ordering::Greater => Some(match self {
                Playing => Paused,
                Paused => Ready,
                Ready | Null => Null,
            }),
        }
    }
}

/// A single-step state change requested from an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StateTransition {
    /// Current state.
    pub from: LifecycleState,
    /// Requested state (adjacent to `from`).
    pub to: LifecycleState,
}

impl StateTransition {
    /// Whether this step moves toward Playing.
    pub fn is_upward(&self) -> bool {
        self.to > self.from
    }
}

/// Outcome of [`Element::change_state`].
#[derive(Debug)]
pub enum StateChange {
    /// The element is now in the requested state.
    Success,
    /// The element will report completion later through the acknowledgement.
    Async(StateAck),
    /// The element refused the transition.
    Failure(String),
}

/// Pending acknowledgement of an asynchronous state change.
#[derive(Debug)]
pub struct StateAck {
    rx: Receiver<Result<(), String>>,
}

/// Completes a pending [`StateAck`].
#[derive(Debug, Clone)]
pub struct StateAckSender {
    tx: Sender<Result<(), String>>,
}

/// Why waiting on a [`StateAck`] failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AckError {
    /// The element did not answer in time.
    Timeout,
    /// The element answered with a failure.
    Failed(String),
    /// The element dropped the sender without answering.
    Abandoned,
}

impl StateAck {
    /// Create a connected acknowledgement pair.
    pub fn channel() -> (StateAckSender, StateAck) {
        let (tx, rx) = crossbeam_channel::bounded(1);
        (StateAckSender { tx }, StateAck { rx })
    }

    /// Block until the element answers or `timeout` elapses.
    pub fn wait(self, timeout: Duration) -> Result<(), AckError> {
        match self.rx.recv_timeout(timeout) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(reason)) => Err(AckError::Failed(reason)),
            Err(RecvTimeoutError::Timeout) => Err(AckError::Timeout),
            Err(RecvTimeoutError::Disconnected) => Err(AckError::Abandoned),
        }
    }
}

impl StateAckSender {
    /// Report that the transition completed.
    pub fn complete(self) {
        let _ = self.tx.send(Ok(()));
    }

    /// Report that the transition failed.
    pub fn fail(self, reason: impl Into<String>) {
        let _ = self.tx.send(Err(reason.into()));
    }
}

// ============================================================================
// Element
// ============================================================================

/// An opaque processing unit supplied by the media framework.
///
/// The orchestrator never looks inside an element: it only asks for its pad
/// templates, configures properties at construction time, and drives its
/// lifecycle. Kind-specific behavior is entirely the element's business.
///
/// Implementations must not call back into the pipeline (for example through a
/// [`PadEmitter`]) from inside these methods; the graph is locked while they run.
pub trait Element: Send {
    /// Logical kind of this element (e.g. "queue", "vorbisenc").
    fn kind(&self) -> &str;

    /// Pad templates this element exposes.
    fn pad_templates(&self) -> Vec<PadTemplate>;

    /// Set a construction-time property.
    fn set_property(&mut self, name: &str, value: &PropertyValue) -> Result<(), CreationError> {
        Err(CreationError::InvalidProperty {
            kind: self.kind().to_string(),
            property: name.to_string(),
            reason: format!("no such property (value {})", value.as_string()),
        })
    }

    /// Perform one lifecycle step.
    fn change_state(&mut self, transition: StateTransition) -> StateChange;

    /// Receive the emitter used to announce dynamic pads.
    ///
    /// Called once when the pipeline registers its stream handler. Elements
    /// without `Sometimes` templates can ignore it.
    fn connect_pad_added(&mut self, emitter: PadEmitter) {
        let _ = emitter;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use LifecycleState::*;

    #[test]
    fn test_state_ordering() {
        assert!(Null < Ready);
        assert!(Ready < Paused);
        assert!(Paused < Playing);
        assert_eq!(LifecycleState::default(), Null);
    }

    #[test]
    fn test_next_toward() {
        assert_eq!(Null.next_toward(Playing), Some(Ready));
        assert_eq!(Ready.next_toward(Playing), Some(Paused));
        assert_eq!(Paused.next_toward(Playing), Some(Playing));
        assert_eq!(Playing.next_toward(Playing), None);
        assert_eq!(Playing.next_toward(Null), Some(Paused));
        assert_eq!(Ready.next_toward(Null), Some(Null));
    }

    #[test]
    fn test_transition_direction() {
        assert!(StateTransition { from: Null, to: Ready }.is_upward());
        assert!(!StateTransition { from: Paused, to: Ready }.is_upward());
    }

    #[test]
    fn test_ack_complete() {
        let (tx, ack) = StateAck::channel();
        std::thread::spawn(move || tx.complete());
        assert_eq!(ack.wait(Duration::from_secs(1)), Ok(()));
    }

    #[test]
    fn test_ack_failure_and_abandon() {
        let (tx, ack) = StateAck::channel();
        tx.fail("no device");
        assert_eq!(
            ack.wait(Duration::from_secs(1)),
            Err(AckError::Failed("no device".into()))
        );

        let (tx, ack) = StateAck::channel();
        drop(tx);
        assert_eq!(ack.wait(Duration::from_secs(1)), Err(AckError::Abandoned));
    }

    #[test]
    fn test_ack_timeout() {
        let (_tx, ack) = StateAck::channel();
        assert_eq!(ack.wait(Duration::from_millis(10)), Err(AckError::Timeout));
    }
}
