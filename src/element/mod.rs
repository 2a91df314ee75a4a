//! Element system: what the orchestrator knows about processing nodes.
//!
//! Elements come from the media framework and are opaque to the core. This
//! module defines the narrow interface used to drive them:
//!
//! - [`Element`]: pad templates, properties, lifecycle steps
//! - [`Pad`] / [`PadTemplate`]: static, request and dynamic connection points
//! - [`LifecycleState`] / [`StateChange`]: stepwise state control, with
//!   asynchronous completion through [`StateAck`]
//! - [`PadEmitter`]: how demuxer-like elements announce streams they discover
//!
//! # Example
//!
//! ```rust
//! use padweave::element::{Element, PadTemplate, StateChange, StateTransition};
//! use padweave::format::Caps;
//!
//! struct Identity;
//!
//! impl Element for Identity {
//!     fn kind(&self) -> &str {
//!         "identity"
//!     }
//!
//!     fn pad_templates(&self) -> Vec<PadTemplate> {
//!         vec![PadTemplate::sink(Caps::any()), PadTemplate::src(Caps::any())]
//!     }
//!
//!     fn change_state(&mut self, _transition: StateTransition) -> StateChange {
//!         StateChange::Success
//!     }
//! }
//! ```

mod context;
mod pad;
mod traits;

pub use context::{PadEmitter, StreamHandler};
pub use pad::{Pad, PadDirection, PadPresence, PadTemplate};
pub use traits::{
    AckError, Element, LifecycleState, StateAck, StateAckSender, StateChange, StateTransition,
};
