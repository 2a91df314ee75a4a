//! Pad abstraction for element inputs and outputs.
//!
//! Pads are the connection points of nodes. They come from templates declared
//! by the element:
//!
//! - `Always` templates produce a pad as soon as the node is added.
//! - `Request` templates produce pads on demand (muxer inputs).
//! - `Sometimes` templates produce pads when the element discovers a stream
//!   (demuxer outputs).

use crate::format::Caps;
use crate::pipeline::PadRef;

/// Direction of a pad (input or output).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PadDirection {
    /// A sink pad (receives data from upstream).
    Input,
    /// A source pad (sends data downstream).
    Output,
}

/// Whether a pad is always present or created dynamically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PadPresence {
    /// Pad is always present on the element.
    Always,
    /// Pad is created by the element as it discovers streams.
    Sometimes,
    /// Pad is created when requested.
    Request,
}

/// Template for creating pads.
#[derive(Debug, Clone, PartialEq)]
pub struct PadTemplate {
    /// Name pattern for this pad (e.g., "src", "sink", "audio_%u").
    pub name: String,
    /// Direction of this pad.
    pub direction: PadDirection,
    /// Whether this pad is always present or created on demand.
    pub presence: PadPresence,
    /// Formats pads from this template accept or produce.
    pub caps: Caps,
}

impl PadTemplate {
    /// Create a new pad template.
    pub fn new(
        name: impl Into<String>,
        direction: PadDirection,
        presence: PadPresence,
        caps: Caps,
    ) -> Self {
        Self {
            name: name.into(),
            direction,
            presence,
            caps,
        }
    }

    /// An always-present input pad named "sink".
    pub fn sink(caps: Caps) -> Self {
        Self::new("sink", PadDirection::Input, PadPresence::Always, caps)
    }

    /// An always-present output pad named "src".
    pub fn src(caps: Caps) -> Self {
        Self::new("src", PadDirection::Output, PadPresence::Always, caps)
    }

    /// A sometimes-present output pad.
    pub fn sometimes_output(name: impl Into<String>, caps: Caps) -> Self {
        Self::new(name, PadDirection::Output, PadPresence::Sometimes, caps)
    }

    /// A request input pad.
    pub fn request_input(name: impl Into<String>, caps: Caps) -> Self {
        Self::new(name, PadDirection::Input, PadPresence::Request, caps)
    }

    /// Name of the `n`th pad created from this template.
    ///
    /// `%u` and `%d` are replaced by `n`; a template without a placeholder
    /// gets the number appended.
    pub fn instance_name(&self, n: u32) -> String {
        if self.name.contains("%u") {
            self.name.replacen("%u", &n.to_string(), 1)
        } else if self.name.contains("%d") {
            self.name.replacen("%d", &n.to_string(), 1)
        } else if self.presence == PadPresence::Always {
            self.name.clone()
        } else {
            format!("{}{}", self.name, n)
        }
    }
}

/// A pad instance on a node.
#[derive(Debug, Clone)]
pub struct Pad {
    name: String,
    direction: PadDirection,
    presence: PadPresence,
    template_caps: Caps,
    current_caps: Option<Caps>,
    peer: Option<PadRef>,
}

impl Pad {
    /// Create a pad from a template.
    pub fn from_template(template: &PadTemplate, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            direction: template.direction,
            presence: template.presence,
            template_caps: template.caps.clone(),
            current_caps: None,
            peer: None,
        }
    }

    /// Set the negotiated caps.
    pub fn with_current_caps(mut self, caps: Caps) -> Self {
        self.current_caps = Some(caps);
        self
    }

    /// Get the pad's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the pad's direction.
    pub fn direction(&self) -> PadDirection {
        self.direction
    }

    /// How this pad came to exist.
    pub fn presence(&self) -> PadPresence {
        self.presence
    }

    /// Check if this is an input pad.
    pub fn is_input(&self) -> bool {
        self.direction == PadDirection::Input
    }

    /// Check if this is an output pad.
    pub fn is_output(&self) -> bool {
        self.direction == PadDirection::Output
    }

    /// Negotiated caps, if any.
    pub fn current_caps(&self) -> Option<&Caps> {
        self.current_caps.as_ref()
    }

    /// Caps used for link checks: negotiated caps if present, else the template's.
    pub fn caps(&self) -> &Caps {
        self.current_caps.as_ref().unwrap_or(&self.template_caps)
    }

    /// The pad this one is linked to.
    pub fn peer(&self) -> Option<&PadRef> {
        self.peer.as_ref()
    }

    /// Whether this pad has a link.
    pub fn is_linked(&self) -> bool {
        self.peer.is_some()
    }

    pub(crate) fn set_peer(&mut self, peer: PadRef) {
        debug_assert!(self.peer.is_none(), "pad '{}' linked twice", self.name);
        self.peer = Some(peer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pad_creation() {
        let input = Pad::from_template(&PadTemplate::sink(Caps::any()), "sink");
        assert_eq!(input.name(), "sink");
        assert!(input.is_input());
        assert!(!input.is_output());
        assert!(!input.is_linked());

        let output = Pad::from_template(&PadTemplate::src(Caps::any()), "src");
        assert!(output.is_output());
        assert_eq!(output.presence(), PadPresence::Always);
    }

    #[test]
    fn test_pad_template() {
        let template = PadTemplate::sometimes_output("src_%u", Caps::any());
        assert_eq!(template.direction, PadDirection::Output);
        assert_eq!(template.presence, PadPresence::Sometimes);

        let template = PadTemplate::request_input("audio_%u", Caps::simple("audio/x-vorbis"));
        assert_eq!(template.direction, PadDirection::Input);
        assert_eq!(template.presence, PadPresence::Request);
    }

    #[test]
    fn test_instance_names() {
        let t = PadTemplate::request_input("video_%u", Caps::any());
        assert_eq!(t.instance_name(0), "video_0");
        assert_eq!(t.instance_name(7), "video_7");

        let t = PadTemplate::request_input("sink_", Caps::any());
        assert_eq!(t.instance_name(2), "sink_2");

        assert_eq!(PadTemplate::src(Caps::any()).instance_name(3), "src");
    }

    #[test]
    fn test_current_caps_override_template() {
        let template = PadTemplate::sometimes_output("src_%u", Caps::any());
        let pad = Pad::from_template(&template, "src_0");
        assert!(pad.caps().is_any());

        let pad = pad.with_current_caps(Caps::simple("audio/x-vorbis"));
        assert_eq!(pad.caps().to_string(), "audio/x-vorbis");
        assert!(pad.current_caps().is_some());
    }
}
