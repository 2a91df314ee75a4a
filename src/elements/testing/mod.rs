//! Testing elements.
//!
//! - [`AudioTestSrc`]: raw audio source with an optional end of stream
//! - [`FakeSink`]: discarding sink, optionally prerolling asynchronously

mod null;
mod testsrc;

pub use null::FakeSink;
pub use testsrc::{AudioTestSrc, Wave};
