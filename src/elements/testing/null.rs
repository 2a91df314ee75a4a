//! Fake sink that discards everything.

use crate::element::{
    Element, LifecycleState, PadTemplate, StateAck, StateChange, StateTransition,
};
use crate::error::CreationError;
use crate::format::Caps;
use crate::pipeline::PropertyValue;
use std::time::Duration;

/// A sink accepting any caps, useful for tests and static pipelines.
///
/// It can imitate sinks that preroll asynchronously or refuse a state.
///
/// # Properties
///
/// - `preroll-delay-ms`: complete the `Ready -> Paused` step asynchronously,
///   after this delay
/// - `reject-state`: refuse upward steps into this state
///   (`ready`, `paused`, `playing`)
///
/// # Example
///
/// ```rust
/// use padweave::element::{Element, LifecycleState, StateChange, StateTransition};
/// use padweave::elements::FakeSink;
///
/// let mut sink = FakeSink::new().with_preroll_delay(std::time::Duration::from_millis(5));
/// let step = StateTransition { from: LifecycleState::Ready, to: LifecycleState::Paused };
/// match sink.change_state(step) {
///     StateChange::Async(ack) => ack.wait(std::time::Duration::from_secs(1)).unwrap(),
///     other => panic!("expected async preroll, got {other:?}"),
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct FakeSink {
    preroll_delay: Option<Duration>,
    reject: Option<LifecycleState>,
}

impl FakeSink {
    /// Create a sink that changes state synchronously.
    pub fn new() -> Self {
        Self::default()
    }

    /// Preroll asynchronously after `delay`.
    pub fn with_preroll_delay(mut self, delay: Duration) -> Self {
        self.preroll_delay = Some(delay);
        self
    }

    /// Refuse to step up into `state`.
    pub fn rejecting(mut self, state: LifecycleState) -> Self {
        self.reject = Some(state);
        self
    }

    fn preroll(&self, delay: Duration) -> StateChange {
        let (tx, ack) = StateAck::channel();
        let spawned = std::thread::Builder::new()
            .name("fakesink-preroll".into())
            .spawn(move || {
                std::thread::sleep(delay);
                tx.complete();
            });
        match spawned {
            Ok(_) => StateChange::Async(ack),
            Err(e) => StateChange::Failure(format!("cannot start preroll: {e}")),
        }
    }
}

fn parse_state(name: &str) -> Option<LifecycleState> {
    match name.to_ascii_lowercase().as_str() {
        "ready" => Some(LifecycleState::Ready),
        "paused" => Some(LifecycleState::Paused),
        "playing" => Some(LifecycleState::Playing),
        _ => None,
    }
}

impl Element for FakeSink {
    fn kind(&self) -> &str {
        "fakesink"
    }

    fn pad_templates(&self) -> Vec<PadTemplate> {
        vec![PadTemplate::sink(Caps::any())]
    }

    fn set_property(&mut self, name: &str, value: &PropertyValue) -> Result<(), CreationError> {
        let invalid = |reason: &str| CreationError::InvalidProperty {
            kind: "fakesink".into(),
            property: name.to_string(),
            reason: reason.to_string(),
        };
        match name {
            "preroll-delay-ms" => {
                let ms = value
                    .as_u64()
                    .ok_or_else(|| invalid("expected milliseconds"))?;
                self.preroll_delay = Some(Duration::from_millis(ms));
            }
            "reject-state" => {
                self.reject = Some(
                    parse_state(&value.as_string())
                        .ok_or_else(|| invalid("expected ready, paused or playing"))?,
                );
            }
            _ => return Err(invalid("no such property")),
        }
        Ok(())
    }

    fn change_state(&mut self, transition: StateTransition) -> StateChange {
        if transition.is_upward() && self.reject == Some(transition.to) {
            return StateChange::Failure(format!("refusing {:?}", transition.to));
        }
        match (transition.from, transition.to, self.preroll_delay) {
            (LifecycleState::Ready, LifecycleState::Paused, Some(delay)) => self.preroll(delay),
            _ => StateChange::Success,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reject_state_property() {
        let mut sink = FakeSink::new();
        sink.set_property("reject-state", &PropertyValue::from("Paused"))
            .unwrap();

        let up = StateTransition {
            from: LifecycleState::Ready,
            to: LifecycleState::Paused,
        };
        assert!(matches!(sink.change_state(up), StateChange::Failure(_)));

        let down = StateTransition {
            from: LifecycleState::Playing,
            to: LifecycleState::Paused,
        };
        assert!(matches!(sink.change_state(down), StateChange::Success));
    }

    #[test]
    fn test_unknown_state_name() {
        let mut sink = FakeSink::new();
        assert!(
            sink.set_property("reject-state", &PropertyValue::from("null"))
                .is_err()
        );
    }
}
