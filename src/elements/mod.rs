//! Built-in reference elements.
//!
//! These model pads, caps and lifecycle; they move no media. They are what
//! [`ElementFactory::new`] registers:
//!
//! ## Sources
//! - [`FileSrc`] (`filesrc`): reads the input container
//! - [`AudioTestSrc`] (`audiotestsrc`): raw audio, optional end of stream
//!
//! ## Demuxers
//! - [`DecodeBin`] (`decodebin`): dynamic `src_%u` pads, driven by a
//!   [`DemuxController`] or the `streams` property
//!
//! ## Branch elements
//! - [`Queue`] (`queue`)
//! - [`AudioConvert`] (`audioconvert`), [`VideoConvert`] (`videoconvert`)
//! - [`VorbisEnc`] (`vorbisenc`), [`Vp8Enc`] (`vp8enc`)
//!
//! ## Muxers
//! - [`WebmMux`] (`webmmux`): `audio_%u` / `video_%u` request pads
//!
//! ## Sinks
//! - [`FileSink`] (`filesink`): writes the output container
//! - [`FakeSink`] (`fakesink`): discards, optional asynchronous preroll

pub mod codec;
pub mod demux;
pub mod flow;
pub mod io;
pub mod mux;
pub mod testing;
pub mod transform;

pub use codec::{VorbisEnc, Vp8Enc};
pub use demux::{DEMUX_SRC_TEMPLATE, DecodeBin, DemuxController};
pub use flow::{LeakyMode, Queue};
pub use io::{FileSink, FileSrc};
pub use mux::{AUDIO_TEMPLATE, VIDEO_TEMPLATE, WebmMux};
pub use testing::{AudioTestSrc, FakeSink, Wave};
pub use transform::{AudioConvert, Dithering, VideoConvert};

use crate::pipeline::ElementFactory;

/// Register every built-in element under its kind name.
pub fn register_builtins(factory: &mut ElementFactory) {
    // Sources
    factory.register("filesrc", || Box::new(FileSrc::default()));
    factory.register("audiotestsrc", || Box::new(AudioTestSrc::new()));

    // Demuxers
    factory.register("decodebin", || Box::new(DecodeBin::new()));

    // Branch elements
    factory.register("queue", || Box::new(Queue::new()));
    factory.register("audioconvert", || Box::new(AudioConvert::new()));
    factory.register("videoconvert", || Box::new(VideoConvert::new()));
    factory.register("vorbisenc", || Box::new(VorbisEnc::new()));
    factory.register("vp8enc", || Box::new(Vp8Enc::new()));

    // Muxers
    factory.register("webmmux", || Box::new(WebmMux::new()));

    // Sinks
    factory.register("filesink", || Box::new(FileSink::default()));
    factory.register("fakesink", || Box::new(FakeSink::new()));
}
