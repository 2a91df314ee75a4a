//! Bus and the events carried on it.
//!
//! Events are posted from any thread (streaming threads, element callbacks,
//! the branch builder) and consumed by the bus supervisor's async loop.

use crate::element::LifecycleState;
use crate::format::Caps;
use crate::pipeline::classify::MediaClass;
use std::fmt;
use tokio::sync::mpsc;

/// Classification of a bus error.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A discovered stream matched no media class.
    StreamClassificationFailed,
    /// A branch for a discovered stream could not be built or attached.
    BranchConstructionFailed,
    /// A node refused a lifecycle transition.
    StateTransitionRejected,
    /// An error reported by an element, with its own code.
    Element {
        /// Element-defined code.
        code: u32,
    },
}

impl ErrorKind {
    /// Numeric code of this kind.
    pub fn code(&self) -> u32 {
        match self {
            ErrorKind::StreamClassificationFailed => 1,
            ErrorKind::BranchConstructionFailed => 2,
            ErrorKind::StateTransitionRejected => 3,
            ErrorKind::Element { code } => *code,
        }
    }

    /// Whether the error concerns a single dynamic branch rather than the
    /// pipeline as a whole.
    pub fn is_branch_failure(&self) -> bool {
        matches!(
            self,
            ErrorKind::StreamClassificationFailed | ErrorKind::BranchConstructionFailed
        )
    }
}

/// Payload of [`BusEvent::Error`] and [`BusEvent::Warning`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorMessage {
    /// Name of the node the error concerns, if any.
    pub source: Option<String>,
    /// Error classification.
    pub kind: ErrorKind,
    /// Human-readable message.
    pub message: String,
    /// Extra diagnostic detail.
    pub debug: Option<String>,
}

impl ErrorMessage {
    /// Create a message without source or debug detail.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            source: None,
            kind,
            message: message.into(),
            debug: None,
        }
    }

    /// Set the source node name.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Set the debug detail.
    pub fn with_debug(mut self, debug: impl Into<String>) -> Self {
        self.debug = Some(debug.into());
        self
    }
}

impl fmt::Display for ErrorMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{} (code {}): {}", source, self.kind.code(), self.message),
            None => write!(f, "code {}: {}", self.kind.code(), self.message),
        }
    }
}

/// Events carried on the pipeline bus.
#[derive(Debug, Clone, PartialEq)]
pub enum BusEvent {
    /// End of stream reached.
    Eos {
        /// Node that reported it, if known.
        source: Option<String>,
    },

    /// A fatal error, unless tolerated by the failure policy.
    Error(ErrorMessage),

    /// A non-fatal issue.
    Warning(ErrorMessage),

    /// A node completed a lifecycle step.
    StateChanged {
        /// Node name.
        node: String,
        /// Previous state.
        from: LifecycleState,
        /// New state.
        to: LifecycleState,
    },

    /// An element exposed a new dynamic pad.
    StreamDiscovered {
        /// Node that exposed the pad.
        node: String,
        /// Pad name.
        pad: String,
        /// Caps the element announced.
        caps: Caps,
    },

    /// A branch was built and attached to the multiplexer.
    BranchLinked {
        /// Media class of the branch.
        class: MediaClass,
        /// Name of the branch's head node.
        head: String,
        /// Multiplexer pad the branch feeds.
        mux_pad: String,
    },
}

impl BusEvent {
    /// Short label used in logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            BusEvent::Eos { .. } => "eos",
            BusEvent::Error(_) => "error",
            BusEvent::Warning(_) => "warning",
            BusEvent::StateChanged { .. } => "state_changed",
            BusEvent::StreamDiscovered { .. } => "stream_discovered",
            BusEvent::BranchLinked { .. } => "branch_linked",
        }
    }
}

impl fmt::Display for BusEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusEvent::Eos { source: Some(s) } => write!(f, "EOS from {}", s),
            BusEvent::Eos { source: None } => write!(f, "EOS"),
            BusEvent::Error(msg) => write!(f, "Error: {}", msg),
            BusEvent::Warning(msg) => write!(f, "Warning: {}", msg),
            BusEvent::StateChanged { node, from, to } => {
                write!(f, "{}: {:?} -> {:?}", node, from, to)
            }
            BusEvent::StreamDiscovered { node, pad, caps } => {
                write!(f, "new pad {}:{} ({})", node, pad, caps)
            }
            BusEvent::BranchLinked {
                class,
                head,
                mux_pad,
            } => write!(f, "{} branch {} linked to {}", class, head, mux_pad),
        }
    }
}

/// Sending side of the pipeline bus.
///
/// Cheap to clone; posting never blocks and works from any thread.
#[derive(Clone, Debug)]
pub struct Bus {
    sender: mpsc::UnboundedSender<BusEvent>,
}

impl Bus {
    /// Create a bus and its watch.
    pub fn channel() -> (Bus, BusWatch) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Bus { sender }, BusWatch { receiver })
    }

    /// Post an event.
    ///
    /// Returns `false` if the watch has been dropped, in which case the event
    /// is discarded.
    pub fn post(&self, event: BusEvent) -> bool {
        crate::observability::record_bus_event(event.label());
        self.sender.send(event).is_ok()
    }

    /// Post an end-of-stream event.
    pub fn post_eos(&self, source: Option<String>) -> bool {
        self.post(BusEvent::Eos { source })
    }

    /// Post an error event.
    pub fn post_error(&self, message: ErrorMessage) -> bool {
        self.post(BusEvent::Error(message))
    }
}

/// Receiving side of the pipeline bus.
#[derive(Debug)]
pub struct BusWatch {
    receiver: mpsc::UnboundedReceiver<BusEvent>,
}

impl BusWatch {
    /// Wait for the next event.
    ///
    /// Returns `None` once every [`Bus`] handle has been dropped and the
    /// queue is drained.
    pub async fn recv(&mut self) -> Option<BusEvent> {
        self.receiver.recv().await
    }

    /// Take the next event if one is queued.
    pub fn try_recv(&mut self) -> Option<BusEvent> {
        self.receiver.try_recv().ok()
    }

    /// Drain every queued event.
    pub fn drain(&mut self) -> Vec<BusEvent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(ErrorKind::StreamClassificationFailed.code(), 1);
        assert_eq!(ErrorKind::BranchConstructionFailed.code(), 2);
        assert_eq!(ErrorKind::StateTransitionRejected.code(), 3);
        assert_eq!(ErrorKind::Element { code: 42 }.code(), 42);

        assert!(ErrorKind::StreamClassificationFailed.is_branch_failure());
        assert!(!ErrorKind::StateTransitionRejected.is_branch_failure());
    }

    #[test]
    fn test_event_display() {
        let event = BusEvent::Error(
            ErrorMessage::new(
                ErrorKind::StreamClassificationFailed,
                "could not detect media stream type",
            )
            .with_source("decodebin0"),
        );
        assert_eq!(
            event.to_string(),
            "Error: decodebin0 (code 1): could not detect media stream type"
        );
        assert_eq!(BusEvent::Eos { source: None }.to_string(), "EOS");
    }

    #[tokio::test]
    async fn test_bus_delivers_in_order() {
        let (bus, mut watch) = Bus::channel();
        let other = bus.clone();

        bus.post(BusEvent::Warning(ErrorMessage::new(
            ErrorKind::Element { code: 7 },
            "late buffer",
        )));
        std::thread::spawn(move || other.post_eos(Some("filesrc0".into())))
            .join()
            .unwrap();

        assert_eq!(watch.recv().await.unwrap().label(), "warning");
        assert_eq!(
            watch.recv().await,
            Some(BusEvent::Eos {
                source: Some("filesrc0".into())
            })
        );
    }

    #[tokio::test]
    async fn test_watch_closes_when_bus_dropped() {
        let (bus, mut watch) = Bus::channel();
        bus.post_eos(None);
        drop(bus);

        assert!(watch.recv().await.is_some());
        assert!(watch.recv().await.is_none());
    }

    #[test]
    fn test_post_after_watch_dropped() {
        let (bus, watch) = Bus::channel();
        drop(watch);
        assert!(!bus.post_eos(None));
    }
}
