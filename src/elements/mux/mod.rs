//! Multiplexer elements.
//!
//! - [`WebmMux`]: WebM container with `audio_%u` / `video_%u` request pads

mod webm;

pub use webm::{AUDIO_TEMPLATE, VIDEO_TEMPLATE, WebmMux};
