//! Pipeline construction and supervision.
//!
//! This module provides the orchestration core:
//!
//! - [`SharedGraph`]: the locked arena graph of nodes, pads and links
//! - [`NodeFactory`]: creates nodes from kinds or chain descriptions
//! - [`StreamClassifier`]: maps discovered caps to media classes
//! - [`BranchBuilder`]: grows one chain per discovered stream into the muxer
//! - [`StateSynchronizer`]: steps nodes to the pipeline target state
//! - [`BusSupervisor`]: watches the bus until end of stream or error
//! - [`PipelineSupervisor`]: owns all of the above and runs to completion
//!
//! # Example
//!
//! ```rust,no_run
//! use padweave::pipeline::{TerminationReason, build_pipeline, run};
//!
//! # async fn demo() -> padweave::Result<()> {
//! let mut pipeline = build_pipeline("input.mkv", "output.webm")?;
//! match run(&mut pipeline).await? {
//!     TerminationReason::EndOfStream => println!("done"),
//!     other => println!("stopped: {other:?}"),
//! }
//! # Ok(())
//! # }
//! ```

pub mod branch;
pub mod bus_supervisor;
pub mod classify;
pub mod events;
pub mod factory;
mod graph;
pub mod parser;
pub mod state;
pub mod supervisor;

pub use branch::{
    BranchBuilder, BranchRecipe, BranchTable, DiscoveryDispatch, Dispatcher, LinkedBranch,
    StreamDiscovered,
};
pub use bus_supervisor::{BusSupervisor, FailurePolicy, SupervisorState, TerminationReason};
pub use classify::{MediaClass, MediaClassSet, StreamClassifier};
pub use events::{Bus, BusEvent, BusWatch, ErrorKind, ErrorMessage};
pub use factory::{ElementFactory, NodeFactory};
pub use graph::{Graph, Link, Node, NodeId, PadRef, SharedGraph, WeakGraph};
pub use parser::{ParsedChain, ParsedElement, PropertyValue, parse_caps, parse_chain};
pub use state::{DEFAULT_STATE_TIMEOUT, StateSynchronizer};
pub use supervisor::{
    PipelineSupervisor, Skeleton, SkeletonConfig, SupervisorConfig, build_pipeline, run,
};
