//! Stream classification from declared caps.

use crate::format::Caps;
use smallvec::SmallVec;
use std::fmt;

/// Media class of a discovered stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[non_exhaustive]
pub enum MediaClass {
    /// Audio streams (`audio/...`).
    Audio,
    /// Video streams (`video/...`).
    Video,
}

impl MediaClass {
    /// Lowercase name used in logs and metrics labels.
    pub fn name(&self) -> &'static str {
        match self {
            MediaClass::Audio => "audio",
            MediaClass::Video => "video",
        }
    }
}

impl fmt::Display for MediaClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The classes a stream matched, in classifier table order, without duplicates.
///
/// Empty means the stream could not be classified.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaClassSet(SmallVec<[MediaClass; 2]>);

impl MediaClassSet {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether nothing matched.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of classes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether `class` is in the set.
    pub fn contains(&self, class: MediaClass) -> bool {
        self.0.contains(&class)
    }

    /// Iterate in table order.
    pub fn iter(&self) -> impl Iterator<Item = MediaClass> + '_ {
        self.0.iter().copied()
    }

    fn insert(&mut self, class: MediaClass) {
        if !self.contains(class) {
            self.0.push(class);
        }
    }
}

impl<'a> IntoIterator for &'a MediaClassSet {
    type Item = MediaClass;
    type IntoIter = std::iter::Copied<std::slice::Iter<'a, MediaClass>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter().copied()
    }
}

/// Maps caps to media classes by name prefix.
///
/// Prefixes are tested in table order and the result keeps that order, so
/// with the default table a stream matching both classes yields audio first.
#[derive(Debug, Clone)]
pub struct StreamClassifier {
    table: Vec<(String, MediaClass)>,
}

impl Default for StreamClassifier {
    fn default() -> Self {
        Self {
            table: vec![
                ("audio/".to_string(), MediaClass::Audio),
                ("video/".to_string(), MediaClass::Video),
            ],
        }
    }
}

impl StreamClassifier {
    /// Classifier with the default `audio/` and `video/` prefixes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Classifier with no prefixes at all.
    pub fn empty() -> Self {
        Self { table: Vec::new() }
    }

    /// Append a prefix to the table.
    pub fn with_prefix(mut self, prefix: impl Into<String>, class: MediaClass) -> Self {
        self.table.push((prefix.into(), class));
        self
    }

    /// Classify a caps set.
    ///
    /// ANY caps name no media type and therefore match nothing.
    pub fn classify(&self, caps: &Caps) -> MediaClassSet {
        let mut set = MediaClassSet::new();
        for (prefix, class) in &self.table {
            if caps
                .structures()
                .iter()
                .any(|s| s.name().starts_with(prefix.as_str()))
            {
                set.insert(*class);
            }
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::CapsStructure;

    #[test]
    fn test_audio_and_video() {
        let classifier = StreamClassifier::new();

        let audio = classifier.classify(&Caps::simple("audio/x-vorbis"));
        assert_eq!(audio.iter().collect::<Vec<_>>(), [MediaClass::Audio]);

        let video = classifier.classify(&Caps::simple("video/x-vp8"));
        assert_eq!(video.iter().collect::<Vec<_>>(), [MediaClass::Video]);
    }

    #[test]
    fn test_unknown_is_empty() {
        let classifier = StreamClassifier::new();
        assert!(classifier.classify(&Caps::simple("text/x-subtitle")).is_empty());
        assert!(classifier.classify(&Caps::any()).is_empty());
        // Prefix match only, not substring.
        assert!(classifier.classify(&Caps::simple("application/audio")).is_empty());
    }

    #[test]
    fn test_multiple_structures_keep_table_order() {
        let caps = Caps::many([
            CapsStructure::new("video/x-vp8"),
            CapsStructure::new("audio/x-opus"),
            CapsStructure::new("audio/x-vorbis"),
        ]);
        let set = StreamClassifier::new().classify(&caps);
        assert_eq!(set.len(), 2);
        assert_eq!(
            set.iter().collect::<Vec<_>>(),
            [MediaClass::Audio, MediaClass::Video]
        );
    }

    #[test]
    fn test_custom_prefix() {
        let classifier = StreamClassifier::empty().with_prefix("image/", MediaClass::Video);
        assert!(
            classifier
                .classify(&Caps::simple("image/jpeg"))
                .contains(MediaClass::Video)
        );
        assert!(classifier.classify(&Caps::simple("audio/x-raw")).is_empty());
    }
}
