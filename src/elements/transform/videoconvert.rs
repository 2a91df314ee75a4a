//! Video pixel format conversion element.

use crate::element::{Element, PadTemplate, StateChange, StateTransition};
use crate::error::CreationError;
use crate::format::Caps;
use crate::pipeline::PropertyValue;

/// Raw video converter.
///
/// `n-threads` sets the worker count (`0` picks one per core).
#[derive(Debug, Clone, Default)]
pub struct VideoConvert {
    threads: u64,
}

impl VideoConvert {
    /// Create a converter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configured worker count.
    pub fn threads(&self) -> u64 {
        self.threads
    }
}

impl Element for VideoConvert {
    fn kind(&self) -> &str {
        "videoconvert"
    }

    fn pad_templates(&self) -> Vec<PadTemplate> {
        let raw = Caps::simple("video/x-raw");
        vec![PadTemplate::sink(raw.clone()), PadTemplate::src(raw)]
    }

    fn set_property(&mut self, name: &str, value: &PropertyValue) -> Result<(), CreationError> {
        match (name, value.as_u64()) {
            ("n-threads", Some(n)) => {
                self.threads = n;
                Ok(())
            }
            _ => Err(CreationError::InvalidProperty {
                kind: "videoconvert".into(),
                property: name.to_string(),
                reason: format!("unsupported value {}", value.as_string()),
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

    #[test]
    fn test_threads_property() {
        let mut convert = VideoConvert::new();
        convert
            .set_property("n-threads", &PropertyValue::Integer(4))
            .unwrap();
        assert_eq!(convert.threads(), 4);
        assert!(
            convert
                .set_property("n-threads", &PropertyValue::from("many"))
                .is_err()
        );
    }
}
