//! # Padweave
//!
//! Dynamic demux-to-mux pipeline orchestration over late-bound pads.
//!
//! A remux pipeline is a static skeleton (`source -> demuxer` and
//! `muxer -> sink`) plus one processing branch per elementary stream. The
//! streams are only known once the demuxer has read the container, so
//! branches are grown at runtime, from streaming threads, while the pipeline
//! is already playing.
//!
//! ## Features
//!
//! - **Atomic branch growth**: each branch is created, synchronized to the
//!   pipeline state and linked to a fresh mux request pad without ever
//!   being visible half-linked
//! - **Caps-based classification**: discovered streams are routed by media
//!   class (audio, video) to configurable chains
//! - **Stepwise lifecycle**: `Null -> Ready -> Paused -> Playing`, with
//!   asynchronous completion and bounded waits
//! - **Bus supervision**: end of stream, errors and cancellation all converge
//!   on one teardown
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use padweave::prelude::*;
//!
//! # async fn demo() -> padweave::Result<()> {
//! let mut pipeline = build_pipeline("input.mkv", "output.webm")?;
//! let reason = run(&mut pipeline).await?;
//! println!("finished: {reason:?}");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod element;
pub mod elements;
pub mod error;
pub mod format;
pub mod observability;
pub mod pipeline;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::element::{Element, LifecycleState, PadTemplate, StateChange, StateTransition};
    pub use crate::error::{Error, Result};
    pub use crate::format::Caps;
    pub use crate::pipeline::{
        BranchTable, BusEvent, DiscoveryDispatch, ElementFactory, FailurePolicy, MediaClass,
        PipelineSupervisor, SupervisorConfig, TerminationReason, build_pipeline, run,
    };
}

pub use error::{Error, Result};
