//! Queue element decoupling a branch from its upstream thread.

use crate::element::{Element, PadTemplate, StateChange, StateTransition};
use crate::error::CreationError;
use crate::format::Caps;
use crate::pipeline::PropertyValue;
use std::time::Duration;

/// Leaky mode determines what happens when the queue is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LeakyMode {
    /// Block until space is available (default).
    #[default]
    None,
    /// Drop new buffers when full.
    Upstream,
    /// Drop the oldest buffers when full.
    Downstream,
}

impl LeakyMode {
    fn parse(value: &PropertyValue) -> Option<Self> {
        match value {
            PropertyValue::Integer(0) | PropertyValue::Bool(false) => Some(Self::None),
            PropertyValue::Integer(1) => Some(Self::Upstream),
            PropertyValue::Integer(2) => Some(Self::Downstream),
            PropertyValue::String(s) => match s.as_str() {
                "no" | "none" => Some(Self::None),
                "upstream" => Some(Self::Upstream),
                "downstream" => Some(Self::Downstream),
                _ => None,
            },
            _ => None,
        }
    }
}

/// A thread-boundary queue. Accepts and produces any caps.
///
/// # Properties
///
/// - `max-size-buffers` (default 200, `0` for unlimited)
/// - `max-size-time` in nanoseconds (default 1 s)
/// - `leaky`: `no`, `upstream` or `downstream`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Queue {
    max_buffers: u64,
    max_time: Duration,
    leaky: LeakyMode,
}

impl Queue {
    /// Default buffer limit.
    pub const DEFAULT_MAX_BUFFERS: u64 = 200;

    /// Create a queue with default limits.
    pub fn new() -> Self {
        Self {
            max_buffers: Self::DEFAULT_MAX_BUFFERS,
            max_time: Duration::from_secs(1),
            leaky: LeakyMode::None,
        }
    }

    /// Buffer limit (`0` means unlimited).
    pub fn max_buffers(&self) -> u64 {
        self.max_buffers
    }

    /// Time limit.
    pub fn max_time(&self) -> Duration {
        self.max_time
    }

    /// Leaky mode.
    pub fn leaky(&self) -> LeakyMode {
        self.leaky
    }
}

impl Default for Queue {
    fn default() -> Self {
        Self::new()
    }
}

impl Element for Queue {
    fn kind(&self) -> &str {
        "queue"
    }

    fn pad_templates(&self) -> Vec<PadTemplate> {
        vec![PadTemplate::sink(Caps::any()), PadTemplate::src(Caps::any())]
    }

    fn set_property(&mut self, name: &str, value: &PropertyValue) -> Result<(), CreationError> {
        let invalid = |reason: &str| CreationError::InvalidProperty {
            kind: "queue".into(),
            property: name.to_string(),
            reason: reason.to_string(),
        };
        match name {
            "max-size-buffers" => {
                self.max_buffers = value
                    .as_u64()
                    .ok_or_else(|| invalid("expected a non-negative integer"))?;
            }
            "max-size-time" => {
                let ns = value
                    .as_u64()
                    .ok_or_else(|| invalid("expected nanoseconds"))?;
                self.max_time = Duration::from_nanos(ns);
            }
            "leaky" => {
                self.leaky = LeakyMode::parse(value)
                    .ok_or_else(|| invalid("expected no, upstream or downstream"))?;
            }
            _ => return Err(invalid("no such property")),
        }
        Ok(())
    }

    fn change_state(&mut self, _transition: StateTransition) -> StateChange {
        StateChange::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::parse_chain;

    #[test]
    fn test_queue_properties() {
        let chain = parse_chain("queue max-size-buffers=0 max-size-time=500000000 leaky=downstream")
            .unwrap();
        let mut queue = Queue::new();
        for (name, value) in &chain.elements[0].properties {
            queue.set_property(name, value).unwrap();
        }
        assert_eq!(queue.max_buffers(), 0);
        assert_eq!(queue.max_time(), Duration::from_millis(500));
        assert_eq!(queue.leaky(), LeakyMode::Downstream);
    }

    #[test]
    fn test_queue_rejects_bad_values() {
        let mut queue = Queue::new();
        assert!(queue.set_property("leaky", &PropertyValue::from("sideways")).is_err());
        assert!(queue.set_property("max-size-buffers", &PropertyValue::Integer(-1)).is_err());
        assert!(queue.set_property("bogus", &PropertyValue::Bool(true)).is_err());
        assert_eq!(queue, Queue::new());
    }
}
