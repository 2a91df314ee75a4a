//! Flow control elements.
//!
//! - [`Queue`]: thread boundary at the head and tail of every branch

mod queue;

pub use queue::{LeakyMode, Queue};
