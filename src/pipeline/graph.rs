//! Pipeline graph structure using daggy.
//!
//! The graph is an arena: nodes live in a [`Dag`] and are referred to by
//! [`NodeId`] handles, pads by [`PadRef`]s. Nodes are never removed, so
//! handles stay valid for the lifetime of the pipeline.
//!
//! [`Graph`] is the unlocked model with the invariant checks. [`SharedGraph`]
//! wraps it in a mutex and is what the rest of the orchestrator holds.

use crate::element::{
    Element, LifecycleState, Pad, PadEmitter, PadPresence, PadTemplate, StreamHandler,
};
use crate::error::{LinkError, PadError};
use crate::format::Caps;
use crate::pipeline::events::Bus;
use daggy::petgraph::algo::{has_path_connecting, toposort};
use daggy::{Dag, NodeIndex, Walker};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt::{self, Write as _};
use std::sync::{Arc, Weak};

/// Unique identifier for a node in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) NodeIndex);

impl NodeId {
    /// Get the underlying index.
    pub fn index(&self) -> usize {
        self.0.index()
    }
}

/// Handle to a pad: the owning node plus the pad name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PadRef {
    node: NodeId,
    name: String,
}

impl PadRef {
    /// Refer to pad `name` on `node`.
    pub fn new(node: NodeId, name: impl Into<String>) -> Self {
        Self {
            node,
            name: name.into(),
        }
    }

    /// The owning node.
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// The pad name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A node in the pipeline graph.
pub struct Node {
    name: String,
    kind: String,
    element: Box<dyn Element>,
    state: LifecycleState,
    templates: Vec<PadTemplate>,
    pads: Vec<Pad>,
    /// Next instance number per request/sometimes template.
    pad_counters: HashMap<String, u32>,
    /// Serializes lifecycle changes of this node across synchronizers.
    state_lock: Arc<Mutex<()>>,
}

impl Node {
    fn new(name: String, element: Box<dyn Element>, templates: Vec<PadTemplate>) -> Self {
        let pads = templates
            .iter()
            .filter(|t| t.presence == PadPresence::Always)
            .map(|t| Pad::from_template(t, t.name.clone()))
            .collect();

        Self {
            name,
            kind: element.kind().to_string(),
            element,
            state: LifecycleState::Null,
            templates,
            pads,
            pad_counters: HashMap::new(),
            state_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Get the node's unique name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the element kind.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Pad templates declared by the element.
    pub fn templates(&self) -> &[PadTemplate] {
        &self.templates
    }

    /// All pad instances.
    pub fn pads(&self) -> &[Pad] {
        &self.pads
    }

    /// Look up a pad by name.
    pub fn pad(&self, name: &str) -> Option<&Pad> {
        self.pads.iter().find(|p| p.name() == name)
    }

    fn pad_mut(&mut self, name: &str) -> Option<&mut Pad> {
        self.pads.iter_mut().find(|p| p.name() == name)
    }

    pub(crate) fn element_mut(&mut self) -> &mut dyn Element {
        self.element.as_mut()
    }

    pub(crate) fn set_state(&mut self, state: LifecycleState) {
        self.state = state;
    }

    pub(crate) fn state_lock(&self) -> Arc<Mutex<()>> {
        Arc::clone(&self.state_lock)
    }

    /// Create the next pad from a request or sometimes template.
    fn instantiate(
        &mut self,
        template: &str,
        presence: PadPresence,
        caps: Option<Caps>,
    ) -> Option<String> {
        let template = self
            .templates
            .iter()
            .find(|t| t.name == template && t.presence == presence)?
            .clone();

        let counter = self.pad_counters.entry(template.name.clone()).or_insert(0);
        let mut name = template.instance_name(*counter);
        *counter += 1;
        // Skip names already taken (a template without a placeholder reused).
        while self.pad(&name).is_some() {
            let counter = self.pad_counters.entry(template.name.clone()).or_insert(0);
            name = template.instance_name(*counter);
            *counter += 1;
        }

        let mut pad = Pad::from_template(&template, name.clone());
        if let Some(caps) = caps {
            pad = pad.with_current_caps(caps);
        }
        self.pads.push(pad);
        Some(name)
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("state", &self.state)
            .field("pads", &self.pads.len())
            .finish()
    }
}

/// A link between two nodes in the pipeline.
#[derive(Debug, Clone)]
pub struct Link {
    /// Name of the source pad.
    pub src_pad: String,
    /// Name of the sink pad.
    pub sink_pad: String,
}

impl Link {
    /// Create a link with specific pad names.
    pub fn with_pads(src_pad: impl Into<String>, sink_pad: impl Into<String>) -> Self {
        Self {
            src_pad: src_pad.into(),
            sink_pad: sink_pad.into(),
        }
    }
}

/// The pipeline graph.
pub struct Graph {
    /// The DAG structure.
    dag: Dag<Node, Link>,
    /// Name-to-NodeId mapping for quick lookup.
    nodes_by_name: HashMap<String, NodeId>,
    /// Next instance number per element kind, for `queue0`, `queue1`, ...
    kind_counters: HashMap<String, u32>,
    /// Pipeline-wide target state.
    target: LifecycleState,
}

impl Graph {
    /// Create a new empty graph.
    pub fn new() -> Self {
        Self {
            dag: Dag::new(),
            nodes_by_name: HashMap::new(),
            kind_counters: HashMap::new(),
            target: LifecycleState::Null,
        }
    }

    /// The state every node is expected to reach.
    pub fn target(&self) -> LifecycleState {
        self.target
    }

    pub(crate) fn set_target(&mut self, target: LifecycleState) {
        self.target = target;
    }

    fn next_name(&mut self, kind: &str) -> String {
        let counter = self.kind_counters.entry(kind.to_string()).or_insert(0);
        let name = format!("{}{}", kind, counter);
        *counter += 1;
        name
    }

    /// Names the next nodes of these kinds would get, without reserving them.
    fn preview_names<'a>(&self, kinds: impl Iterator<Item = &'a str>) -> Vec<String> {
        let mut counters: HashMap<&str, u32> = HashMap::new();
        kinds
            .map(|kind| {
                let counter = counters
                    .entry(kind)
                    .or_insert_with(|| self.kind_counters.get(kind).copied().unwrap_or(0));
                let name = format!("{}{}", kind, counter);
                *counter += 1;
                name
            })
            .collect()
    }

    /// Add a node to the graph.
    ///
    /// Static pads are created from the element's `Always` templates. The node
    /// is named after its kind plus an instance number.
    pub fn add_node(&mut self, element: Box<dyn Element>) -> NodeId {
        let templates = element.pad_templates();
        let name = self.next_name(element.kind());
        crate::observability::record_nodes_added(element.kind(), 1);
        let idx = self.dag.add_node(Node::new(name.clone(), element, templates));
        let id = NodeId(idx);
        self.nodes_by_name.insert(name, id);
        id
    }

    /// Add a batch of nodes.
    pub fn add_nodes(&mut self, elements: Vec<Box<dyn Element>>) -> Vec<NodeId> {
        elements.into_iter().map(|e| self.add_node(e)).collect()
    }

    /// Add a chain of nodes linked `src` → `sink` head to tail.
    ///
    /// Every internal link is validated against the pad templates before the
    /// first node is inserted: either the whole chain is added and linked, or
    /// nothing changes.
    pub fn add_chain(&mut self, elements: Vec<Box<dyn Element>>) -> Result<Vec<NodeId>, LinkError> {
        let names = self.preview_names(elements.iter().map(|e| e.kind()));
        let templates: Vec<Vec<PadTemplate>> = elements.iter().map(|e| e.pad_templates()).collect();

        for i in 1..templates.len() {
            check_chain_templates(&names[i - 1], &templates[i - 1], &names[i], &templates[i])?;
        }

        let ids = self.add_nodes(elements);
        for pair in ids.windows(2) {
            self.link(&PadRef::new(pair[0], "src"), &PadRef::new(pair[1], "sink"))?;
        }
        Ok(ids)
    }

    /// Get a node by ID.
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.dag.node_weight(id.0)
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.dag.node_weight_mut(id.0)
    }

    /// Get a node ID by name.
    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.nodes_by_name.get(name).copied()
    }

    /// Look up a pad.
    pub fn pad(&self, pad: &PadRef) -> Option<&Pad> {
        self.node(pad.node)?.pad(&pad.name)
    }

    /// The pad linked to `pad`, if any.
    pub fn peer(&self, pad: &PadRef) -> Option<&PadRef> {
        self.pad(pad)?.peer()
    }

    /// All node IDs in insertion order.
    pub fn nodes(&self) -> Vec<NodeId> {
        self.dag.graph().node_indices().map(NodeId).collect()
    }

    /// IDs of nodes of the given kind.
    pub fn nodes_of_kind(&self, kind: &str) -> Vec<NodeId> {
        self.nodes()
            .into_iter()
            .filter(|id| self.node(*id).is_some_and(|n| n.kind() == kind))
            .collect()
    }

    /// Validate a link without performing it.
    pub fn check_link(&self, src: &PadRef, sink: &PadRef) -> Result<(), LinkError> {
        let src_node = self.node(src.node).ok_or(LinkError::NoSuchNode {
            index: src.node.index(),
        })?;
        let sink_node = self.node(sink.node).ok_or(LinkError::NoSuchNode {
            index: sink.node.index(),
        })?;

        let src_pad = src_node.pad(&src.name).ok_or_else(|| LinkError::NoSuchPad {
            node: src_node.name.clone(),
            pad: src.name.clone(),
        })?;
        let sink_pad = sink_node.pad(&sink.name).ok_or_else(|| LinkError::NoSuchPad {
            node: sink_node.name.clone(),
            pad: sink.name.clone(),
        })?;

        if !src_pad.is_output() {
            return Err(LinkError::WrongDirection {
                node: src_node.name.clone(),
                pad: src.name.clone(),
            });
        }
        if !sink_pad.is_input() {
            return Err(LinkError::WrongDirection {
                node: sink_node.name.clone(),
                pad: sink.name.clone(),
            });
        }

        for (node, pad) in [(src_node, src_pad), (sink_node, sink_pad)] {
            if pad.is_linked() {
                return Err(LinkError::PadAlreadyLinked {
                    node: node.name.clone(),
                    pad: pad.name().to_string(),
                });
            }
        }

        if !src_pad.caps().intersects(sink_pad.caps()) {
            return Err(LinkError::IncompatibleCapabilities {
                src: src_pad.caps().to_string(),
                sink: sink_pad.caps().to_string(),
            });
        }

        if has_path_connecting(self.dag.graph(), sink.node.0, src.node.0, None) {
            return Err(LinkError::WouldCycle {
                src: src_node.name.clone(),
                sink: sink_node.name.clone(),
            });
        }

        Ok(())
    }

    /// Link a source pad to a sink pad.
    ///
    /// All checks run before anything is mutated, so a failed link leaves the
    /// graph untouched.
    pub fn link(&mut self, src: &PadRef, sink: &PadRef) -> Result<(), LinkError> {
        self.check_link(src, sink)?;

        self.dag
            .add_edge(src.node.0, sink.node.0, Link::with_pads(&src.name, &sink.name))
            .map_err(|_| LinkError::WouldCycle {
                src: self.node(src.node).map(|n| n.name.clone()).unwrap_or_default(),
                sink: self.node(sink.node).map(|n| n.name.clone()).unwrap_or_default(),
            })?;

        if let Some(pad) = self.node_mut(src.node).and_then(|n| n.pad_mut(&src.name)) {
            pad.set_peer(sink.clone());
        }
        if let Some(pad) = self.node_mut(sink.node).and_then(|n| n.pad_mut(&sink.name)) {
            pad.set_peer(src.clone());
        }
        Ok(())
    }

    fn instantiate_pad(
        &mut self,
        node: NodeId,
        template: &str,
        presence: PadPresence,
        caps: Option<Caps>,
    ) -> Result<PadRef, PadError> {
        let n = self.node_mut(node).ok_or(PadError::NoSuchNode {
            index: node.index(),
        })?;
        let name = n
            .instantiate(template, presence, caps)
            .ok_or_else(|| PadError::NoSuchTemplate {
                node: n.name.clone(),
                template: template.to_string(),
            })?;
        Ok(PadRef::new(node, name))
    }

    /// Create a pad from one of the node's `Request` templates.
    pub fn request_pad(&mut self, node: NodeId, template: &str) -> Result<PadRef, PadError> {
        self.instantiate_pad(node, template, PadPresence::Request, None)
    }

    /// Create a pad from one of the node's `Sometimes` templates, with the
    /// caps the element discovered.
    pub fn add_dynamic_pad(
        &mut self,
        node: NodeId,
        template: &str,
        caps: Caps,
    ) -> Result<PadRef, PadError> {
        self.instantiate_pad(node, template, PadPresence::Sometimes, Some(caps))
    }

    /// The request template a node exposes under `name`, if any.
    pub fn request_template(&self, node: NodeId, name: &str) -> Option<&PadTemplate> {
        self.node(node)?
            .templates()
            .iter()
            .find(|t| t.name == name && t.presence == PadPresence::Request)
    }

    /// Get the children (downstream nodes) of a node.
    pub fn children(&self, id: NodeId) -> Vec<(NodeId, &Link)> {
        self.dag
            .children(id.0)
            .iter(&self.dag)
            .filter_map(|(edge_idx, node_idx)| {
                self.dag
                    .edge_weight(edge_idx)
                    .map(|link| (NodeId(node_idx), link))
            })
            .collect()
    }

    /// Get the parents (upstream nodes) of a node.
    pub fn parents(&self, id: NodeId) -> Vec<(NodeId, &Link)> {
        self.dag
            .parents(id.0)
            .iter(&self.dag)
            .filter_map(|(edge_idx, node_idx)| {
                self.dag
                    .edge_weight(edge_idx)
                    .map(|link| (NodeId(node_idx), link))
            })
            .collect()
    }

    /// All links as `(source pad, sink pad)` pairs.
    pub fn links(&self) -> Vec<(PadRef, PadRef)> {
        self.dag
            .graph()
            .raw_edges()
            .iter()
            .map(|edge| {
                (
                    PadRef::new(NodeId(edge.source()), edge.weight.src_pad.clone()),
                    PadRef::new(NodeId(edge.target()), edge.weight.sink_pad.clone()),
                )
            })
            .collect()
    }

    /// Nodes ordered downstream-first, the order state changes are applied in.
    pub fn sinks_first(&self) -> Vec<NodeId> {
        match toposort(self.dag.graph(), None) {
            Ok(order) => order.into_iter().rev().map(NodeId).collect(),
            Err(_) => self.nodes().into_iter().rev().collect(),
        }
    }

    /// Get the number of nodes in the graph.
    pub fn node_count(&self) -> usize {
        self.dag.node_count()
    }

    /// Get the number of links in the graph.
    pub fn link_count(&self) -> usize {
        self.dag.edge_count()
    }

    /// Check if the graph is empty.
    pub fn is_empty(&self) -> bool {
        self.dag.node_count() == 0
    }

    /// Render the graph in Graphviz DOT format.
    pub fn to_dot(&self) -> String {
        let mut out = String::from("digraph pipeline {\n  rankdir=LR;\n  node [shape=box];\n");
        for id in self.nodes() {
            if let Some(node) = self.node(id) {
                let _ = writeln!(
                    out,
                    "  \"{}\" [label=\"{}\\n({})\\n{:?}\"];",
                    node.name, node.name, node.kind, node.state
                );
            }
        }
        for (src, sink) in self.links() {
            let (Some(a), Some(b)) = (self.node(src.node), self.node(sink.node)) else {
                continue;
            };
            let _ = writeln!(
                out,
                "  \"{}\" -> \"{}\" [label=\"{} -> {}\"];",
                a.name, b.name, src.name, sink.name
            );
        }
        out.push_str("}\n");
        out
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Graph")
            .field("nodes", &self.node_count())
            .field("links", &self.link_count())
            .field("target", &self.target)
            .finish()
    }
}

/// Check that `up`'s `src` template can feed `down`'s `sink` template.
fn check_chain_templates(
    up_name: &str,
    up: &[PadTemplate],
    down_name: &str,
    down: &[PadTemplate],
) -> Result<(), LinkError> {
    let find = |templates: &[PadTemplate], name: &str| {
        templates
            .iter()
            .find(|t| t.name == name && t.presence == PadPresence::Always)
            .cloned()
    };

    let src = find(up, "src").ok_or_else(|| LinkError::NoSuchPad {
        node: up_name.to_string(),
        pad: "src".into(),
    })?;
    let sink = find(down, "sink").ok_or_else(|| LinkError::NoSuchPad {
        node: down_name.to_string(),
        pad: "sink".into(),
    })?;

    if !src.caps.intersects(&sink.caps) {
        return Err(LinkError::IncompatibleCapabilities {
            src: src.caps.to_string(),
            sink: sink.caps.to_string(),
        });
    }
    Ok(())
}

/// Thread-safe handle to the pipeline graph.
///
/// Every mutating operation holds the lock for its whole duration, so
/// concurrent callers from streaming threads never interleave inside a link
/// or pad request. Multi-step mutations that must appear atomic go through
/// [`SharedGraph::transaction`].
#[derive(Clone, Default)]
pub struct SharedGraph(Arc<Mutex<Graph>>);

impl SharedGraph {
    /// Create a handle to a new empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect the graph under the lock.
    pub fn read<R>(&self, f: impl FnOnce(&Graph) -> R) -> R {
        f(&self.0.lock())
    }

    /// Run several mutations under a single lock acquisition.
    pub(crate) fn transaction<R>(&self, f: impl FnOnce(&mut Graph) -> R) -> R {
        f(&mut self.0.lock())
    }

    /// See [`Graph::add_node`].
    pub fn add_node(&self, element: Box<dyn Element>) -> NodeId {
        self.0.lock().add_node(element)
    }

    /// See [`Graph::link`].
    pub fn link(&self, src: &PadRef, sink: &PadRef) -> Result<(), LinkError> {
        self.0.lock().link(src, sink)
    }

    /// See [`Graph::request_pad`].
    pub fn request_pad(&self, node: NodeId, template: &str) -> Result<PadRef, PadError> {
        self.0.lock().request_pad(node, template)
    }

    /// See [`Graph::add_dynamic_pad`].
    pub fn add_dynamic_pad(
        &self,
        node: NodeId,
        template: &str,
        caps: Caps,
    ) -> Result<PadRef, PadError> {
        self.0.lock().add_dynamic_pad(node, template, caps)
    }

    /// The pipeline-wide target state.
    pub fn target_state(&self) -> LifecycleState {
        self.0.lock().target()
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.0.lock().node_count()
    }

    /// Graphviz rendering of the current graph.
    pub fn to_dot(&self) -> String {
        self.0.lock().to_dot()
    }

    /// A handle that does not keep the graph alive.
    pub fn downgrade(&self) -> WeakGraph {
        WeakGraph(Arc::downgrade(&self.0))
    }

    /// Hand `node`'s element an emitter delivering its dynamic pads to
    /// `handler`. Returns `false` if the node does not exist.
    pub fn connect_pad_added(&self, node: NodeId, handler: StreamHandler, bus: Bus) -> bool {
        let weak = self.downgrade();
        self.transaction(|g| match g.node_mut(node) {
            Some(n) => {
                let emitter = PadEmitter::new(weak, node, n.name().to_string(), bus, handler);
                n.element_mut().connect_pad_added(emitter);
                true
            }
            None => false,
        })
    }
}

/// Weak counterpart of [`SharedGraph`], held by elements.
#[derive(Clone, Debug)]
pub struct WeakGraph(Weak<Mutex<Graph>>);

impl WeakGraph {
    /// The graph, if the pipeline still exists.
    pub fn upgrade(&self) -> Option<SharedGraph> {
        self.0.upgrade().map(SharedGraph)
    }
}

impl fmt::Debug for SharedGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.lock().fmt(f)
    }
}
