//! Software encoders for WebM output.
//!
//! # Example
//!
//! ```rust
//! use padweave::element::Element;
//! use padweave::elements::codec::VorbisEnc;
//! use padweave::pipeline::PropertyValue;
//!
//! let mut enc = VorbisEnc::new();
//! enc.set_property("quality", &PropertyValue::Float(0.6)).unwrap();
//! assert!(enc.set_property("quality", &PropertyValue::Float(1.5)).is_err());
//! ```

use crate::element::{Element, PadTemplate, StateChange, StateTransition};
use crate::error::CreationError;
use crate::format::Caps;
use crate::pipeline::PropertyValue;

fn invalid(kind: &str, property: &str, reason: impl Into<String>) -> CreationError {
    CreationError::InvalidProperty {
        kind: kind.to_string(),
        property: property.to_string(),
        reason: reason.into(),
    }
}

/// Vorbis audio encoder: `audio/x-raw` in, `audio/x-vorbis` out.
#[derive(Debug, Clone)]
pub struct VorbisEnc {
    quality: f64,
}

impl VorbisEnc {
    /// Default VBR quality.
    pub const DEFAULT_QUALITY: f64 = 0.3;

    /// Create an encoder at default quality.
    pub fn new() -> Self {
        Self {
            quality: Self::DEFAULT_QUALITY,
        }
    }

    /// VBR quality in `-0.1..=1.0`.
    pub fn quality(&self) -> f64 {
        self.quality
    }
}

impl Default for VorbisEnc {
    fn default() -> Self {
        Self::new()
    }
}

impl Element for VorbisEnc {
    fn kind(&self) -> &str {
        "vorbisenc"
    }

    fn pad_templates(&self) -> Vec<PadTemplate> {
        vec![
            PadTemplate::sink(Caps::simple("audio/x-raw")),
            PadTemplate::src(Caps::simple("audio/x-vorbis")),
        ]
    }

    fn set_property(&mut self, name: &str, value: &PropertyValue) -> Result<(), CreationError> {
        if name != "quality" {
            return Err(invalid("vorbisenc", name, "no such property"));
        }
        match value.as_f64() {
            Some(q) if (-0.1..=1.0).contains(&q) => {
                self.quality = q;
                Ok(())
            }
            _ => Err(invalid(
                "vorbisenc",
                name,
                format!("{} is outside -0.1..=1.0", value.as_string()),
            )),
        }
    }

    fn change_state(&mut self, _transition: StateTransition) -> StateChange {
        StateChange::Success
    }
}

/// VP8 video encoder: `video/x-raw` in, `video/x-vp8` out.
#[derive(Debug, Clone)]
pub struct Vp8Enc {
    target_bitrate: u64,
    deadline: u64,
}

impl Vp8Enc {
    /// Default target bitrate in bits per second.
    pub const DEFAULT_BITRATE: u64 = 256_000;

    /// Create an encoder at default bitrate, realtime deadline.
    pub fn new() -> Self {
        Self {
            target_bitrate: Self::DEFAULT_BITRATE,
            deadline: 1,
        }
    }

    /// Target bitrate in bits per second.
    pub fn target_bitrate(&self) -> u64 {
        self.target_bitrate
    }

    /// Per-frame encoding deadline in microseconds (`0` is best quality).
    pub fn deadline(&self) -> u64 {
        self.deadline
    }
}

impl Default for Vp8Enc {
    fn default() -> Self {
        Self::new()
    }
}

impl Element for Vp8Enc {
    fn kind(&self) -> &str {
        "vp8enc"
    }

    fn pad_templates(&self) -> Vec<PadTemplate> {
        vec![
            PadTemplate::sink(Caps::simple("video/x-raw")),
            PadTemplate::src(Caps::simple("video/x-vp8")),
        ]
    }

    fn set_property(&mut self, name: &str, value: &PropertyValue) -> Result<(), CreationError> {
        match name {
            "target-bitrate" => {
                self.target_bitrate = value
                    .as_u64()
                    .filter(|b| *b > 0)
                    .ok_or_else(|| invalid("vp8enc", name, "expected a positive bitrate"))?;
            }
            "deadline" => {
                self.deadline = value
                    .as_u64()
                    .ok_or_else(|| invalid("vp8enc", name, "expected microseconds"))?;
            }
            _ => return Err(invalid("vp8enc", name, "no such property")),
        }
        Ok(())
    }

    fn change_state(&mut self, _transition: StateTransition) -> StateChange {
        StateChange::Success
    }
}
