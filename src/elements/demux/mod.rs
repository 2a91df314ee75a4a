//! Demultiplexing elements.
//!
//! - [`DecodeBin`]: exposes elementary streams as dynamic pads

mod decodebin;

pub use decodebin::{DEMUX_SRC_TEMPLATE, DecodeBin, DemuxController};
