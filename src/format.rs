//! Capability sets describing the data flowing through a pad.
//!
//! A [`Caps`] is an ordered list of [`CapsStructure`]s, each naming a media
//! type (`audio/x-raw`, `video/x-vp8`, ...) with optional `key=value` fields.
//! An empty list means "any format".
//!
//! Caps have a textual form used in diagnostics and configuration:
//!
//! ```text
//! audio/x-raw, rate=44100, channels=2; audio/x-vorbis
//! ```
//!
//! # Example
//!
//! ```rust
//! use padweave::format::Caps;
//!
//! let raw: Caps = "audio/x-raw, rate=44100".parse().unwrap();
//! let wildcard: Caps = "audio/*".parse().unwrap();
//!
//! assert!(raw.intersects(&wildcard));
//! assert!(raw.intersects(&Caps::any()));
//! assert!(!raw.intersects(&Caps::simple("video/x-vp8")));
//! ```

use crate::error::ParseError;
use crate::pipeline::parser::parse_caps;
use smallvec::SmallVec;
use std::fmt;
use std::str::FromStr;

/// One entry of a capability set: a media type name plus fields.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CapsStructure {
    name: String,
    fields: Vec<(String, String)>,
}

impl CapsStructure {
    /// Create a structure with no fields.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Add a field, replacing any previous value for the same key.
    pub fn with_field(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        let key = key.into();
        let value = value.to_string();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((key, value)),
        }
        self
    }

    /// The media type name (e.g. `audio/x-vorbis`).
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up a field value.
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// All fields in declaration order.
    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    /// Whether the name is a `type/*` wildcard.
    #[inline]
    pub fn is_wildcard(&self) -> bool {
        self.name.ends_with("/*")
    }

    fn names_match(&self, other: &CapsStructure) -> bool {
        if self.name == other.name {
            return true;
        }
        let wildcard_matches = |pattern: &CapsStructure, concrete: &CapsStructure| {
            pattern
                .name
                .strip_suffix('*')
                .is_some_and(|prefix| concrete.name.starts_with(prefix))
        };
        wildcard_matches(self, other) || wildcard_matches(other, self)
    }

    /// Check whether two structures describe at least one common format.
    ///
    /// Names must match (wildcards allowed) and every field present on both
    /// sides must carry the same value.
    pub fn intersects(&self, other: &CapsStructure) -> bool {
        self.names_match(other)
            && self.fields.iter().all(|(key, value)| {
                other
                    .field(key)
                    .is_none_or(|other_value| other_value == value)
            })
    }
}

impl fmt::Display for CapsStructure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        for (key, value) in &self.fields {
            write!(f, ", {}={}", key, value)?;
        }
        Ok(())
    }
}

/// A capability set.
///
/// An empty set means "any format" and is compatible with everything.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Caps(SmallVec<[CapsStructure; 2]>);

impl Caps {
    /// Create caps that accept any format.
    pub fn any() -> Self {
        Self(SmallVec::new())
    }

    /// Create caps with a single structure.
    pub fn new(structure: CapsStructure) -> Self {
        let mut v = SmallVec::new();
        v.push(structure);
        Self(v)
    }

    /// Create caps with a single field-less structure.
    pub fn simple(name: impl Into<String>) -> Self {
        Self::new(CapsStructure::new(name))
    }

    /// Create caps from several structures, the first one preferred.
    pub fn many(structures: impl IntoIterator<Item = CapsStructure>) -> Self {
        Self(structures.into_iter().collect())
    }

    /// Is this "any format"?
    #[inline]
    pub fn is_any(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of structures.
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Same as [`Caps::is_any`].
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The structures in preference order.
    #[inline]
    pub fn structures(&self) -> &[CapsStructure] {
        &self.0
    }

    /// Structure at `index`, if any.
    pub fn structure(&self, index: usize) -> Option<&CapsStructure> {
        self.0.get(index)
    }

    /// Append a structure.
    pub fn push(&mut self, structure: CapsStructure) {
        self.0.push(structure);
    }

    /// Check if compatible with another caps.
    ///
    /// Two caps are compatible if either accepts anything, or if some pair of
    /// structures intersects.
    pub fn intersects(&self, other: &Caps) -> bool {
        if self.is_any() || other.is_any() {
            return true;
        }
        self.0
            .iter()
            .any(|a| other.0.iter().any(|b| a.intersects(b)))
    }
}

impl fmt::Display for Caps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_any() {
            return f.write_str("ANY");
        }
        for (i, structure) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", structure)?;
        }
        Ok(())
    }
}

impl FromStr for Caps {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_caps(s)
    }
}

impl From<CapsStructure> for Caps {
    fn from(structure: CapsStructure) -> Self {
        Caps::new(structure)
    }
}

impl FromIterator<CapsStructure> for Caps {
    fn from_iter<I: IntoIterator<Item = CapsStructure>>(iter: I) -> Self {
        Caps::many(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_any_intersects_everything() {
        let any = Caps::any();
        assert!(any.is_any());
        assert!(any.intersects(&Caps::simple("video/x-vp8")));
        assert!(Caps::simple("audio/x-raw").intersects(&any));
    }

    #[test]
    fn test_exact_names() {
        let vorbis = Caps::simple("audio/x-vorbis");
        assert!(vorbis.intersects(&Caps::simple("audio/x-vorbis")));
        assert!(!vorbis.intersects(&Caps::simple("audio/x-opus")));
    }

    #[test]
    fn test_wildcard_matches_type() {
        let any_audio = Caps::simple("audio/*");
        assert!(any_audio.intersects(&Caps::simple("audio/x-raw")));
        assert!(Caps::simple("audio/x-raw").intersects(&any_audio));
        assert!(!any_audio.intersects(&Caps::simple("video/x-raw")));
    }

    #[test]
    fn test_conflicting_fields() {
        let a = Caps::new(CapsStructure::new("audio/x-raw").with_field("rate", 44100));
        let b = Caps::new(CapsStructure::new("audio/x-raw").with_field("rate", 48000));
        let c = Caps::new(CapsStructure::new("audio/x-raw").with_field("channels", 2));
        assert!(!a.intersects(&b));
        // Fields only present on one side do not constrain.
        assert!(a.intersects(&c));
    }

    #[test]
    fn test_multi_structure_intersection() {
        let mux: Caps = [
            CapsStructure::new("audio/x-vorbis"),
            CapsStructure::new("audio/x-opus"),
        ]
        .into_iter()
        .collect();
        assert_eq!(mux.len(), 2);
        assert!(mux.intersects(&Caps::simple("audio/x-opus")));
    }

    #[test]
    fn test_with_field_replaces() {
        let s = CapsStructure::new("video/x-raw")
            .with_field("width", 640)
            .with_field("width", 1280);
        assert_eq!(s.field("width"), Some("1280"));
        assert_eq!(s.fields().len(), 1);
    }

    #[test]
    fn test_display() {
        let caps = Caps::many([
            CapsStructure::new("audio/x-raw").with_field("rate", 44100),
            CapsStructure::new("audio/x-vorbis"),
        ]);
        assert_eq!(caps.to_string(), "audio/x-raw, rate=44100; audio/x-vorbis");
        assert_eq!(Caps::any().to_string(), "ANY");
    }

    #[test]
    fn test_from_str_roundtrip_display() {
        let caps: Caps = "video/x-vp8, width=640, height=480".parse().unwrap();
        assert_eq!(caps.structures()[0].name(), "video/x-vp8");
        assert_eq!(caps.structures()[0].field("height"), Some("480"));
        assert_eq!(caps.to_string(), "video/x-vp8, width=640, height=480");
    }
}
