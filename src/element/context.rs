//! Runtime services handed to elements with dynamic pads.
//!
//! A [`PadEmitter`] is given to an element when the pipeline registers its
//! stream handler. The element keeps it and uses it from its own streaming
//! thread to expose newly discovered streams and to report end-of-stream or
//! errors on the bus.

use crate::error::PadError;
use crate::format::Caps;
use crate::pipeline::{
    Bus, BusEvent, ErrorKind, ErrorMessage, NodeId, PadRef, StreamDiscovered, WeakGraph,
};
use std::fmt;
use std::sync::Arc;

/// Callback invoked once for every dynamic pad an element exposes.
pub type StreamHandler = Arc<dyn Fn(StreamDiscovered) + Send + Sync>;

/// Handle an element uses to announce dynamic pads.
#[derive(Clone)]
pub struct PadEmitter {
    graph: WeakGraph,
    node: NodeId,
    node_name: String,
    bus: Bus,
    handler: StreamHandler,
}

impl PadEmitter {
    pub(crate) fn new(
        graph: WeakGraph,
        node: NodeId,
        node_name: String,
        bus: Bus,
        handler: StreamHandler,
    ) -> Self {
        Self {
            graph,
            node,
            node_name,
            bus,
            handler,
        }
    }

    /// The node this emitter belongs to.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Name of the node this emitter belongs to.
    pub fn node_name(&self) -> &str {
        &self.node_name
    }

    /// Expose a new pad from a `Sometimes` template and hand it to the
    /// stream handler.
    ///
    /// The handler runs on the calling thread, after the graph lock has been
    /// released. Fails with [`PadError::Detached`] once the pipeline is gone.
    pub fn emit(&self, template: &str, caps: Caps) -> Result<PadRef, PadError> {
        let graph = self.graph.upgrade().ok_or(PadError::Detached)?;
        let pad = graph.add_dynamic_pad(self.node, template, caps.clone())?;
        drop(graph);

        self.bus.post(BusEvent::StreamDiscovered {
            node: self.node_name.clone(),
            pad: pad.name().to_string(),
            caps: caps.clone(),
        });

        (self.handler)(StreamDiscovered {
            node: self.node,
            pad: pad.clone(),
            caps,
        });
        Ok(pad)
    }

    /// Post end-of-stream on behalf of this element.
    pub fn post_eos(&self) {
        self.bus.post(BusEvent::Eos {
            source: Some(self.node_name.clone()),
        });
    }

    /// Post an element error on behalf of this element.
    pub fn post_error(&self, code: u32, message: impl Into<String>, debug: Option<String>) {
        self.bus.post(BusEvent::Error(ErrorMessage {
            source: Some(self.node_name.clone()),
            kind: ErrorKind::Element { code },
            message: message.into(),
            debug,
        }));
    }
}

impl fmt::Debug for PadEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PadEmitter")
            .field("node", &self.node_name)
            .finish_non_exhaustive()
    }
}
