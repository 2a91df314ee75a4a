//! Element registry and node factory.
//!
//! [`ElementFactory`] is the media-framework side: it maps kind names to
//! constructors. [`NodeFactory`] turns kinds (or parsed descriptions) into
//! nodes of a [`SharedGraph`], in all-or-nothing batches.

use crate::element::Element;
use crate::error::{BranchError, CreationError};
use crate::pipeline::graph::{NodeId, SharedGraph};
use crate::pipeline::parser::{ParsedChain, ParsedElement, PropertyValue};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Type alias for element constructor functions.
type ElementConstructor =
    Arc<dyn Fn() -> Result<Box<dyn Element>, CreationError> + Send + Sync>;

/// Registry of element constructors.
#[derive(Clone)]
pub struct ElementFactory {
    constructors: HashMap<String, ElementConstructor>,
}

impl ElementFactory {
    /// Create a new factory with built-in elements registered.
    pub fn new() -> Self {
        let mut factory = Self::empty();
        crate::elements::register_builtins(&mut factory);
        factory
    }

    /// Create a factory with nothing registered.
    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Register an element constructor, replacing any previous one for `kind`.
    pub fn register<F>(&mut self, kind: &str, constructor: F)
    where
        F: Fn() -> Box<dyn Element> + Send + Sync + 'static,
    {
        self.constructors
            .insert(kind.to_string(), Arc::new(move || Ok(constructor())));
    }

    /// Register a constructor that may fail.
    pub fn register_fallible<F>(&mut self, kind: &str, constructor: F)
    where
        F: Fn() -> Result<Box<dyn Element>, CreationError> + Send + Sync + 'static,
    {
        self.constructors
            .insert(kind.to_string(), Arc::new(constructor));
    }

    /// Construct an element and apply properties in order.
    pub fn make(
        &self,
        kind: &str,
        properties: &[(String, PropertyValue)],
    ) -> Result<Box<dyn Element>, CreationError> {
        let constructor = self
            .constructors
            .get(kind)
            .ok_or_else(|| CreationError::UnknownKind {
                kind: kind.to_string(),
            })?;

        let mut element = constructor()?;
        for (name, value) in properties {
            element.set_property(name, value)?;
        }
        Ok(element)
    }

    /// Construct an element from a parsed description.
    pub fn make_parsed(&self, parsed: &ParsedElement) -> Result<Box<dyn Element>, CreationError> {
        self.make(&parsed.kind, &parsed.properties)
    }

    /// Check if an element kind is registered.
    pub fn is_registered(&self, kind: &str) -> bool {
        self.constructors.contains_key(kind)
    }

    /// List all available element kinds, sorted.
    pub fn list_kinds(&self) -> Vec<String> {
        let mut names: Vec<String> = self.constructors.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for ElementFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ElementFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementFactory")
            .field("kinds", &self.list_kinds())
            .finish()
    }
}

/// Creates nodes in a pipeline graph.
#[derive(Clone, Debug)]
pub struct NodeFactory {
    elements: Arc<ElementFactory>,
    graph: SharedGraph,
}

impl NodeFactory {
    /// Create a node factory adding to `graph`.
    pub fn new(elements: Arc<ElementFactory>, graph: SharedGraph) -> Self {
        Self { elements, graph }
    }

    /// The element registry.
    pub fn elements(&self) -> &ElementFactory {
        &self.elements
    }

    /// Create a single node of `kind` with default properties.
    pub fn create(&self, kind: &str) -> Result<NodeId, CreationError> {
        let element = self.elements.make(kind, &[])?;
        let id = self.graph.add_node(element);
        debug!(kind, node = id.index(), "node created");
        Ok(id)
    }

    /// Create several nodes as one batch.
    ///
    /// Every element is constructed before any node is inserted; if one kind
    /// fails, the graph is left untouched.
    pub fn create_many(&self, kinds: &[&str]) -> Result<Vec<NodeId>, CreationError> {
        let parsed: Vec<ParsedElement> = kinds.iter().map(|k| ParsedElement::new(*k)).collect();
        self.create_parsed(&parsed)
    }

    /// Create several nodes with properties as one batch.
    pub fn create_parsed(&self, parsed: &[ParsedElement]) -> Result<Vec<NodeId>, CreationError> {
        let elements = parsed
            .iter()
            .map(|p| self.elements.make_parsed(p))
            .collect::<Result<Vec<_>, _>>()?;

        let ids = self.graph.transaction(|g| g.add_nodes(elements));
        debug!(count = ids.len(), "nodes created");
        Ok(ids)
    }

    /// Create a chain and link it head to tail.
    ///
    /// Either every node is added and every internal link made, or the graph
    /// is left untouched.
    pub fn create_chain(&self, chain: &ParsedChain) -> Result<Vec<NodeId>, BranchError> {
        let elements = chain
            .elements
            .iter()
            .map(|p| self.elements.make_parsed(p))
            .collect::<Result<Vec<_>, _>>()?;

        let ids = self.graph.transaction(|g| g.add_chain(elements))?;
        debug!(chain = %chain, count = ids.len(), "chain created");
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LinkError;
    use crate::pipeline::parser::parse_chain;

    #[test]
    fn test_builtin_kinds_registered() {
        let factory = ElementFactory::new();
        for kind in [
            "filesrc",
            "audiotestsrc",
            "decodebin",
            "queue",
            "audioconvert",
            "videoconvert",
            "vorbisenc",
            "vp8enc",
            "webmmux",
            "filesink",
            "fakesink",
        ] {
            assert!(factory.is_registered(kind), "{kind} not registered");
        }
        assert!(!factory.is_registered("x264enc"));
        assert!(ElementFactory::empty().list_kinds().is_empty());
    }

    #[test]
    fn test_make_unknown_kind() {
        let factory = ElementFactory::new();
        let err = factory.make("x264enc", &[]).err().unwrap();
        assert_eq!(
            err,
            CreationError::UnknownKind {
                kind: "x264enc".into()
            }
        );
    }

    #[test]
    fn test_make_rejects_property() {
        let factory = ElementFactory::new();
        let err = factory
            .make("queue", &[("bogus".into(), PropertyValue::Integer(1))])
            .err()
            .unwrap();
        assert!(matches!(err, CreationError::InvalidProperty { .. }));
    }

    #[test]
    fn test_fallible_constructor() {
        let mut factory = ElementFactory::empty();
        factory.register_fallible("broken", || {
            Err(CreationError::Construction {
                kind: "broken".into(),
                reason: "plugin missing".into(),
            })
        });
        assert!(matches!(
            factory.make("broken", &[]),
            Err(CreationError::Construction { .. })
        ));
    }

    #[test]
    fn test_create_many_all_or_nothing() {
        let graph = SharedGraph::new();
        let nodes = NodeFactory::new(Arc::new(ElementFactory::new()), graph.clone());

        let err = nodes
            .create_many(&["filesrc", "decodebin", "nosuchmux", "filesink"])
            .unwrap_err();
        assert!(matches!(err, CreationError::UnknownKind { .. }));
        assert_eq!(graph.node_count(), 0);

        let ids = nodes.create_many(&["filesrc", "decodebin"]).unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(graph.node_count(), 2);
    }

    #[test]
    fn test_create_chain_links_internally() {
        let graph = SharedGraph::new();
        let nodes = NodeFactory::new(Arc::new(ElementFactory::new()), graph.clone());

        let chain = parse_chain("queue ! audioconvert ! vorbisenc ! queue").unwrap();
        let ids = nodes.create_chain(&chain).unwrap();

        assert_eq!(ids.len(), 4);
        graph.read(|g| {
            assert_eq!(g.link_count(), 3);
            assert_eq!(g.node(ids[0]).unwrap().name(), "queue0");
            assert_eq!(g.node(ids[3]).unwrap().name(), "queue1");
        });
    }

    #[test]
    fn test_create_chain_rejects_bad_chain_without_mutation() {
        let graph = SharedGraph::new();
        let nodes = NodeFactory::new(Arc::new(ElementFactory::new()), graph.clone());

        let chain = parse_chain("queue ! audioconvert ! vp8enc").unwrap();
        let err = nodes.create_chain(&chain).unwrap_err();
        assert!(matches!(
            err,
            BranchError::Link(LinkError::IncompatibleCapabilities { .. })
        ));
        assert_eq!(graph.node_count(), 0);

        let chain = parse_chain("queue ! nosuchenc").unwrap();
        assert!(matches!(
            nodes.create_chain(&chain),
            Err(BranchError::Creation(CreationError::UnknownKind { .. }))
        ));
        assert_eq!(graph.node_count(), 0);
    }
}
