//! WebM multiplexer with per-stream request pads.

use crate::element::{Element, PadTemplate, StateChange, StateTransition};
use crate::error::CreationError;
use crate::format::{Caps, CapsStructure};
use crate::pipeline::PropertyValue;

/// Request template for audio streams.
pub const AUDIO_TEMPLATE: &str = "audio_%u";
/// Request template for video streams.
pub const VIDEO_TEMPLATE: &str = "video_%u";

/// WebM muxer.
///
/// Each encoded stream gets its own pad, requested from `audio_%u`
/// (Vorbis, Opus) or `video_%u` (VP8, VP9). `streamable=true` omits the
/// seek index.
#[derive(Debug, Clone, Default)]
pub struct WebmMux {
    streamable: bool,
}

impl WebmMux {
    /// Create a muxer producing a seekable file.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the output is written for live streaming.
    pub fn is_streamable(&self) -> bool {
        self.streamable
    }
}

impl Element for WebmMux {
    fn kind(&self) -> &str {
        "webmmux"
    }

    fn pad_templates(&self) -> Vec<PadTemplate> {
        let audio = Caps::many([
            CapsStructure::new("audio/x-vorbis"),
            CapsStructure::new("audio/x-opus"),
        ]);
        let video = Caps::many([
            CapsStructure::new("video/x-vp8"),
            CapsStructure::new("video/x-vp9"),
        ]);
        vec![
            PadTemplate::src(Caps::simple("video/webm")),
            PadTemplate::request_input(AUDIO_TEMPLATE, audio),
            PadTemplate::request_input(VIDEO_TEMPLATE, video),
        ]
    }

    fn set_property(&mut self, name: &str, value: &PropertyValue) -> Result<(), CreationError> {
        match (name, value.as_bool()) {
            ("streamable", Some(b)) => {
                self.streamable = b;
                Ok(())
            }
            _ => Err(CreationError::InvalidProperty {
                kind: "webmmux".into(),
                property: name.to_string(),
                reason: "expected streamable=<bool>".into(),
            }),
        }
    }

    fn change_state(&mut self, _transition: StateTransition) -> StateChange {
        StateChange::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::PadPresence;

    #[test]
    fn test_request_templates() {
        let templates = WebmMux::new().pad_templates();
        let requests: Vec<_> = templates
            .iter()
            .filter(|t| t.presence == PadPresence::Request)
            .map(|t| t.name.as_str())
            .collect();
        assert_eq!(requests, [AUDIO_TEMPLATE, VIDEO_TEMPLATE]);

        let audio = &templates[1].caps;
        assert!(audio.intersects(&Caps::simple("audio/x-opus")));
        assert!(!audio.intersects(&Caps::simple("video/x-vp8")));
    }
}
