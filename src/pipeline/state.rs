//! Lifecycle synchronization of nodes with the pipeline target state.
//!
//! A node added to a running pipeline starts in `Null`. Before data can flow
//! into it, it must be stepped to the pipeline's target state, one adjacent
//! transition at a time. Elements may complete a step asynchronously; the
//! synchronizer then waits for the acknowledgement without holding the graph
//! lock.

use crate::element::{AckError, LifecycleState, StateAck, StateChange, StateTransition};
use crate::error::StateError;
use crate::observability::{trace_state_step, trace_target_change};
use crate::pipeline::events::{Bus, BusEvent};
use crate::pipeline::graph::{NodeId, SharedGraph};
use std::time::Duration;

/// Default bound on waiting for an asynchronous state change.
pub const DEFAULT_STATE_TIMEOUT: Duration = Duration::from_secs(5);

/// Outcome of one step taken under the graph lock.
enum Step {
    Done,
    Advanced {
        name: String,
        from: LifecycleState,
        to: LifecycleState,
    },
    Pending {
        name: String,
        from: LifecycleState,
        to: LifecycleState,
        ack: StateAck,
    },
}

/// Brings nodes to the pipeline's target state.
#[derive(Clone, Debug)]
pub struct StateSynchronizer {
    graph: SharedGraph,
    bus: Bus,
    timeout: Duration,
}

impl StateSynchronizer {
    /// Create a synchronizer for `graph`, reporting steps on `bus`.
    pub fn new(graph: SharedGraph, bus: Bus) -> Self {
        Self {
            graph,
            bus,
            timeout: DEFAULT_STATE_TIMEOUT,
        }
    }

    /// Set the bound on asynchronous acknowledgements.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Step `node` until it reaches the pipeline's current target state.
    ///
    /// The target is re-read after every step, so a concurrent pipeline-wide
    /// change is followed. Calling this on a node already at target does
    /// nothing.
    pub fn sync_to_parent(&self, node: NodeId) -> Result<(), StateError> {
        let state_lock = self
            .graph
            .read(|g| g.node(node).map(|n| n.state_lock()))
            .ok_or(StateError::NoSuchNode {
                index: node.index(),
            })?;
        let _serialized = state_lock.lock();

        loop {
            match self.step(node)? {
                Step::Done => return Ok(()),
                Step::Advanced { name, from, to } => self.announce(&name, from, to),
                Step::Pending {
                    name,
                    from,
                    to,
                    ack,
                } => {
                    self.await_ack(&name, from, to, ack)?;
                    self.graph.transaction(|g| {
                        if let Some(n) = g.node_mut(node) {
                            n.set_state(to);
                        }
                    });
                    self.announce(&name, from, to);
                }
            }
        }
    }

    /// Take one step toward the target under the graph lock.
    fn step(&self, node: NodeId) -> Result<Step, StateError> {
        self.graph.transaction(|g| -> Result<Step, StateError> {
            let target = g.target();
            let n = g.node_mut(node).ok_or(StateError::NoSuchNode {
                index: node.index(),
            })?;

            let from = n.state();
            let Some(to) = from.next_toward(target) else {
                return Ok(Step::Done);
            };
            let name = n.name().to_string();

            match n.element_mut().change_state(StateTransition { from, to }) {
                StateChange::Success => {
                    n.set_state(to);
                    Ok(Step::Advanced { name, from, to })
                }
                StateChange::Async(ack) => Ok(Step::Pending {
                    name,
                    from,
                    to,
                    ack,
                }),
                StateChange::Failure(reason) => Err(StateError::StateTransitionRejected {
                    node: name,
                    from,
                    to,
                    reason,
                }),
            }
        })
    }

    fn await_ack(
        &self,
        name: &str,
        from: LifecycleState,
        to: LifecycleState,
        ack: StateAck,
    ) -> Result<(), StateError> {
        tracing::debug!(node = %name, ?from, ?to, "waiting for asynchronous state change");
        ack.wait(self.timeout).map_err(|e| match e {
            AckError::Timeout => StateError::Timeout {
                node: name.to_string(),
                to,
                waited_ms: self.timeout.as_millis() as u64,
            },
            AckError::Failed(reason) => StateError::StateTransitionRejected {
                node: name.to_string(),
                from,
                to,
                reason,
            },
            AckError::Abandoned => StateError::StateTransitionRejected {
                node: name.to_string(),
                from,
                to,
                reason: "element dropped the acknowledgement".to_string(),
            },
        })
    }

    fn announce(&self, name: &str, from: LifecycleState, to: LifecycleState) {
        trace_state_step(name, &format!("{from:?}"), &format!("{to:?}"));
        self.bus.post(BusEvent::StateChanged {
            node: name.to_string(),
            from,
            to,
        });
    }

    /// Change the pipeline-wide target and synchronize every node to it,
    /// downstream nodes first.
    ///
    /// Going up, the first failure stops the walk. Going down, every node is
    /// still visited and the first failure is returned.
    pub fn set_target(&self, target: LifecycleState) -> Result<(), StateError> {
        let (previous, order) = self.graph.transaction(|g| {
            let previous = g.target();
            g.set_target(target);
            (previous, g.sinks_first())
        });
        trace_target_change("pipeline", &format!("{previous:?}"), &format!("{target:?}"));

        let upward = target > previous;
        let mut first_error = None;
        for node in order {
            if let Err(e) = self.sync_to_parent(node) {
                if upward {
                    return Err(e);
                }
                tracing::warn!(error = %e, "node failed to follow target state");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}
