//! Encoder elements.
//!
//! - [`VorbisEnc`]: raw audio to Vorbis
//! - [`Vp8Enc`]: raw video to VP8

mod encoder;

pub use encoder::{VorbisEnc, Vp8Enc};
