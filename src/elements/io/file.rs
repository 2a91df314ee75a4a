//! File-based source and sink elements.

use crate::element::{Element, LifecycleState, PadTemplate, StateChange, StateTransition};
use crate::error::CreationError;
use crate::format::Caps;
use crate::pipeline::PropertyValue;
use std::path::{Path, PathBuf};

fn location_property(
    kind: &str,
    name: &str,
    value: &PropertyValue,
) -> Result<PathBuf, CreationError> {
    match name {
        "location" => {
            let path = value.as_string();
            if path.is_empty() {
                return Err(CreationError::InvalidProperty {
                    kind: kind.to_string(),
                    property: name.to_string(),
                    reason: "expected a non-empty path".to_string(),
                });
            }
            Ok(PathBuf::from(path))
        }
        _ => Err(CreationError::InvalidProperty {
            kind: kind.to_string(),
            property: name.to_string(),
            reason: "no such property".to_string(),
        }),
    }
}

fn require_location(location: &Option<PathBuf>, transition: StateTransition) -> StateChange {
    if transition.from == LifecycleState::Null && location.is_none() {
        StateChange::Failure("no location set".to_string())
    } else {
        StateChange::Success
    }
}

/// A source element that reads a container file.
///
/// Refuses to leave `Null` until `location` is set.
///
/// # Example
///
/// ```rust
/// use padweave::elements::FileSrc;
///
/// let src = FileSrc::new("input.mkv");
/// assert_eq!(src.location().unwrap().to_str(), Some("input.mkv"));
/// ```
#[derive(Debug, Default)]
pub struct FileSrc {
    location: Option<PathBuf>,
}

impl FileSrc {
    /// Create a FileSrc that will read from the given path.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            location: Some(path.as_ref().to_path_buf()),
        }
    }

    /// The configured path.
    pub fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }
}

impl Element for FileSrc {
    fn kind(&self) -> &str {
        "filesrc"
    }

    fn pad_templates(&self) -> Vec<PadTemplate> {
        vec![PadTemplate::src(Caps::any())]
    }

    fn set_property(&mut self, name: &str, value: &PropertyValue) -> Result<(), CreationError> {
        self.location = Some(location_property("filesrc", name, value)?);
        Ok(())
    }

    fn change_state(&mut self, transition: StateTransition) -> StateChange {
        require_location(&self.location, transition)
    }
}

/// A sink element that writes the output container.
#[derive(Debug, Default)]
pub struct FileSink {
    location: Option<PathBuf>,
}

impl FileSink {
    /// Create a FileSink that will write to the given path.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            location: Some(path.as_ref().to_path_buf()),
        }
    }

    /// The configured path.
    pub fn location(&self) -> Option<&Path> {
        self.location.as_deref()
    }
}

impl Element for FileSink {
    fn kind(&self) -> &str {
        "filesink"
    }

    fn pad_templates(&self) -> Vec<PadTemplate> {
        vec![PadTemplate::sink(Caps::any())]
    }

    fn set_property(&mut self, name: &str, value: &PropertyValue) -> Result<(), CreationError> {
        self.location = Some(location_property("filesink", name, value)?);
        Ok(())
    }

    fn change_state(&mut self, transition: StateTransition) -> StateChange {
        require_location(&self.location, transition)
    }
}
