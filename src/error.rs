//! Error types for padweave.
//!
//! Each layer of the orchestrator has its own error enum so callers can tell
//! a missing element kind from a refused link or a stuck state change. The
//! crate-level [`Error`] wraps all of them.

use crate::element::LifecycleState;
use thiserror::Error;

/// Result type alias using padweave's Error.
pub type Result<T> = std::result::Result<T, Error>;

/// A node kind could not be instantiated by the media framework.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CreationError {
    /// No constructor is registered for the requested kind.
    #[error("unknown element kind: {kind}")]
    UnknownKind {
        /// The requested kind.
        kind: String,
    },

    /// The constructor rejected a property.
    #[error("element '{kind}' rejected property '{property}': {reason}")]
    InvalidProperty {
        /// Element kind.
        kind: String,
        /// Property name.
        property: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The constructor failed for another reason.
    #[error("failed to construct '{kind}': {reason}")]
    Construction {
        /// Element kind.
        kind: String,
        /// Failure description.
        reason: String,
    },
}

/// A link between two pads was refused.
///
/// A failed link never mutates the graph.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    /// One of the endpoints refers to a node that is not in the graph.
    #[error("node {index} is not part of the graph")]
    NoSuchNode {
        /// Raw node index.
        index: usize,
    },

    /// The node exists but has no pad with that name.
    #[error("node '{node}' has no pad '{pad}'")]
    NoSuchPad {
        /// Node name.
        node: String,
        /// Pad name.
        pad: String,
    },

    /// A source pad was used as sink or vice versa.
    #[error("pad '{node}:{pad}' has the wrong direction for this link")]
    WrongDirection {
        /// Node name.
        node: String,
        /// Pad name.
        pad: String,
    },

    /// The pad already has a peer.
    #[error("pad '{node}:{pad}' is already linked")]
    PadAlreadyLinked {
        /// Node name.
        node: String,
        /// Pad name.
        pad: String,
    },

    /// The two pads share no common format.
    #[error("incompatible capabilities: {src} -> {sink}")]
    IncompatibleCapabilities {
        /// Caps of the source pad.
        src: String,
        /// Caps of the sink pad.
        sink: String,
    },

    /// The edge would make the graph cyclic.
    #[error("linking '{src}' to '{sink}' would create a cycle")]
    WouldCycle {
        /// Upstream node name.
        src: String,
        /// Downstream node name.
        sink: String,
    },
}

/// A pad could not be created.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PadError {
    /// The node is not in the graph.
    #[error("node {index} is not part of the graph")]
    NoSuchNode {
        /// Raw node index.
        index: usize,
    },

    /// The node has no template with that name and the required presence.
    #[error("node '{node}' has no pad template '{template}'")]
    NoSuchTemplate {
        /// Node name.
        node: String,
        /// Requested template name.
        template: String,
    },

    /// The element is not attached to a live pipeline.
    #[error("element is not attached to a pipeline")]
    Detached,
}

/// A node failed to reach a lifecycle state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    /// The element refused the transition.
    #[error("'{node}' rejected state change {from:?} -> {to:?}: {reason}")]
    StateTransitionRejected {
        /// Node name.
        node: String,
        /// State before the step.
        from: LifecycleState,
        /// State requested.
        to: LifecycleState,
        /// Element-provided reason.
        reason: String,
    },

    /// An asynchronous transition did not complete in time.
    #[error("'{node}' did not reach {to:?} within {waited_ms}ms")]
    Timeout {
        /// Node name.
        node: String,
        /// State requested.
        to: LifecycleState,
        /// How long we waited.
        waited_ms: u64,
    },

    /// Synchronization was requested for a node that is not in the graph.
    #[error("node {index} is not part of the graph")]
    NoSuchNode {
        /// Raw node index.
        index: usize,
    },
}

/// A chain or caps description could not be parsed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot parse {what} '{input}'")]
pub struct ParseError {
    /// What was being parsed ("chain", "caps").
    pub what: &'static str,
    /// The offending input.
    pub input: String,
}

/// A branch for one discovered stream could not be built.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BranchError {
    /// The class has no chain registered.
    #[error("no branch registered for media class '{class}'")]
    NoRecipe {
        /// Media class name.
        class: &'static str,
    },

    /// Creating a chain element failed.
    #[error(transparent)]
    Creation(#[from] CreationError),

    /// Linking failed.
    #[error(transparent)]
    Link(#[from] LinkError),

    /// Requesting the multiplexer pad failed.
    #[error(transparent)]
    Pad(#[from] PadError),

    /// Synchronizing the chain failed.
    #[error(transparent)]
    State(#[from] StateError),
}

/// The static skeleton could not be built.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// A skeleton element could not be created.
    #[error("skeleton element: {0}")]
    Creation(#[from] CreationError),

    /// A skeleton link failed.
    #[error("skeleton link: {0}")]
    Link(#[from] LinkError),

    /// A chain description was malformed.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The branch worker thread could not be started.
    #[error("failed to start branch worker: {reason}")]
    Worker {
        /// OS error description.
        reason: String,
    },

    /// A launch description was too short to form a pipeline.
    #[error("launch description needs at least a source and a sink, got {count} element(s)")]
    TooShort {
        /// Number of elements parsed.
        count: usize,
    },
}

/// The run loop itself failed (as opposed to an error carried by an event).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RunError {
    /// The supervisor already ran to completion and cannot be restarted.
    #[error("pipeline supervisor already stopped")]
    AlreadyStopped,

    /// Every bus sender went away before a terminal event arrived.
    #[error("bus closed before end of stream")]
    BusClosed,

    /// The bus watch was already taken by another run.
    #[error("bus watch already taken")]
    WatchTaken,

    /// The pipeline could not be brought to Playing.
    #[error("failed to start pipeline: {0}")]
    Start(#[from] StateError),
}

/// Main error type for padweave operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Element creation failed.
    #[error(transparent)]
    Creation(#[from] CreationError),

    /// Linking failed.
    #[error(transparent)]
    Link(#[from] LinkError),

    /// Pad creation failed.
    #[error(transparent)]
    Pad(#[from] PadError),

    /// State change failed.
    #[error(transparent)]
    State(#[from] StateError),

    /// Parsing failed.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Branch construction failed.
    #[error(transparent)]
    Branch(#[from] BranchError),

    /// Skeleton construction failed.
    #[error(transparent)]
    Build(#[from] BuildError),

    /// The run loop failed.
    #[error(transparent)]
    Run(#[from] RunError),
}
