//! Audio format conversion element.
//!
//! Converts between raw audio sample formats ahead of an audio encoder.

use crate::element::{Element, PadTemplate, StateChange, StateTransition};
use crate::error::CreationError;
use crate::format::Caps;
use crate::pipeline::PropertyValue;

/// Dithering applied when reducing sample depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dithering {
    /// No dithering.
    None,
    /// Rectangular probability density.
    Rpdf,
    /// Triangular probability density (default).
    #[default]
    Tpdf,
}

/// Raw audio converter.
///
/// # Example
///
/// ```rust
/// use padweave::element::Element;
/// use padweave::elements::AudioConvert;
///
/// let convert = AudioConvert::new();
/// let templates = convert.pad_templates();
/// assert!(templates.iter().all(|t| t.caps.to_string() == "audio/x-raw"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct AudioConvert {
    dithering: Dithering,
}

impl AudioConvert {
    /// Create a converter with default dithering.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configured dithering.
    pub fn dithering(&self) -> Dithering {
        self.dithering
    }
}

impl Element for AudioConvert {
    fn kind(&self) -> &str {
        "audioconvert"
    }

    fn pad_templates(&self) -> Vec<PadTemplate> {
        let raw = Caps::simple("audio/x-raw");
        vec![PadTemplate::sink(raw.clone()), PadTemplate::src(raw)]
    }

    fn set_property(&mut self, name: &str, value: &PropertyValue) -> Result<(), CreationError> {
        if name != "dithering" {
            return Err(CreationError::InvalidProperty {
                kind: "audioconvert".into(),
                property: name.to_string(),
                reason: "no such property".into(),
            });
        }
        self.dithering = match value.as_string().as_str() {
            "none" | "0" => Dithering::None,
            "rpdf" | "1" => Dithering::Rpdf,
            "tpdf" | "2" => Dithering::Tpdf,
            other => {
                return Err(CreationError::InvalidProperty {
                    kind: "audioconvert".into(),
                    property: name.to_string(),
                    reason: format!("unknown dithering '{other}'"),
                });
            }
        };
        Ok(())
    }

    fn change_state(&mut self, _transition: StateTransition) -> StateChange {
        StateChange::Success
    }
}
