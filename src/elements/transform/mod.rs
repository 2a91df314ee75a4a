//! Raw media conversion elements.
//!
//! - [`AudioConvert`]: raw audio ahead of an audio encoder
//! - [`VideoConvert`]: raw video ahead of a video encoder

mod audioconvert;
mod videoconvert;

pub use audioconvert::{AudioConvert, Dithering};
pub use videoconvert::VideoConvert;
