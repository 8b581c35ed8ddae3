//! Configuration paths: dot-delimited addresses into a [`Document`].
//!
//! A path such as `sections.features.items.2.title` names one field of the
//! configuration document.  Each dot-separated segment is either a mapping
//! key or, when it consists only of ASCII digits, a position inside a
//! sequence.
//!
//! Paths are the currency of the visual editor: rendering components derive
//! them while walking the document, attach them to their output, and the
//! addressing layer reports them back to the host when an element is
//! clicked.  For the editor to find the same field again after a re-render,
//! the path for a given document shape must always be the same, which is why
//! the type is a plain value with a canonical string form.
//!
//! [`Document`]: crate::document::Document

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Errors produced when parsing a path string.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    /// The input string was empty.
    #[error("configuration path is empty")]
    Empty,

    /// Two consecutive dots, or a leading/trailing dot.
    #[error("configuration path '{0}' contains an empty segment")]
    EmptySegment(String),
}

/// One segment of a [`ConfigPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// A key inside a mapping.
    Key(String),
    /// A zero-based position inside a sequence.
    Index(usize),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Key(key) => f.write_str(key),
            Segment::Index(index) => write!(f, "{index}"),
        }
    }
}

/// A parsed, canonical configuration path.
///
/// # Example
///
/// ```rust
/// use sitesync_core::document::ConfigPath;
///
/// let path: ConfigPath = "sections.hero.headline".parse().unwrap();
/// assert_eq!(path.to_string(), "sections.hero.headline");
/// assert_eq!(path.child("text").to_string(), "sections.hero.headline.text");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ConfigPath {
    segments: Vec<Segment>,
}

impl ConfigPath {
    /// The root path (addresses the whole document).
    pub fn root() -> Self {
        Self::default()
    }

    /// Returns a new path with a mapping key appended.
    pub fn child(&self, key: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(Segment::Key(key.into()));
        Self { segments }
    }

    /// Returns a new path with a sequence position appended.
    pub fn index(&self, index: usize) -> Self {
        let mut segments = self.segments.clone();
        segments.push(Segment::Index(index));
        Self { segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Returns the path without its last segment, or `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        let (_, rest) = self.segments.split_last()?;
        Some(Self {
            segments: rest.to_vec(),
        })
    }

    /// Returns `true` when `self` equals `other` or lies underneath it.
    pub fn starts_with(&self, other: &ConfigPath) -> bool {
        self.segments.starts_with(&other.segments)
    }
}

impl FromStr for ConfigPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(PathError::Empty);
        }
        let segments = s
            .split('.')
            .map(|raw| {
                if raw.is_empty() {
                    return Err(PathError::EmptySegment(s.to_string()));
                }
                // Canonical all-digit segments address sequence positions.
                // Leading zeros or values past usize stay keys so the path
                // displays exactly as written.
                if is_canonical_index(raw) {
                    if let Ok(index) = raw.parse::<usize>() {
                        return Ok(Segment::Index(index));
                    }
                }
                Ok(Segment::Key(raw.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { segments })
    }
}

fn is_canonical_index(raw: &str) -> bool {
    raw.bytes().all(|b| b.is_ascii_digit()) && (raw == "0" || !raw.starts_with('0'))
}

impl fmt::Display for ConfigPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

// On the wire a path is always its dotted string form.
impl Serialize for ConfigPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ConfigPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keys_and_indices() {
        let path: ConfigPath = "sections.features.items.2.title".parse().unwrap();
        assert_eq!(
            path.segments(),
            &[
                Segment::Key("sections".into()),
                Segment::Key("features".into()),
                Segment::Key("items".into()),
                Segment::Index(2),
                Segment::Key("title".into()),
            ]
        );
    }

    #[test]
    fn test_display_is_canonical_form_of_parse() {
        let raw = "sections.blog.posts.0.tags.1";
        let path: ConfigPath = raw.parse().unwrap();
        assert_eq!(path.to_string(), raw);
    }

    #[test]
    fn test_leading_zero_segment_stays_a_key() {
        let raw = "sections.faq.items.01";
        let path: ConfigPath = raw.parse().unwrap();

        assert_eq!(
            path.segments().last(),
            Some(&Segment::Key("01".to_string()))
        );
        assert_eq!(path.to_string(), raw);
        assert_eq!(
            "sections.faq.items.0".parse::<ConfigPath>().unwrap().segments().last(),
            Some(&Segment::Index(0))
        );
    }

    #[test]
    fn test_empty_string_is_rejected() {
        assert_eq!("".parse::<ConfigPath>(), Err(PathError::Empty));
    }

    #[test]
    fn test_empty_segments_are_rejected() {
        for raw in ["sections..hero", ".sections", "sections."] {
            assert!(
                matches!(raw.parse::<ConfigPath>(), Err(PathError::EmptySegment(_))),
                "{raw} must be rejected"
            );
        }
    }

    #[test]
    fn test_builders_match_parsed_paths() {
        let built = ConfigPath::root()
            .child("sections")
            .child("faq")
            .child("items")
            .index(3);
        let parsed: ConfigPath = "sections.faq.items.3".parse().unwrap();
        assert_eq!(built, parsed);
    }

    #[test]
    fn test_parent_and_starts_with() {
        let path: ConfigPath = "sections.hero.cta".parse().unwrap();
        let parent = path.parent().unwrap();
        assert_eq!(parent.to_string(), "sections.hero");
        assert!(path.starts_with(&parent));
        assert!(!parent.starts_with(&path));
        assert!(ConfigPath::root().parent().is_none());
    }

    #[test]
    fn test_serde_uses_dotted_string() {
        let path: ConfigPath = "sections.hero.headline".parse().unwrap();
        let json = serde_json::to_string(&path).unwrap();
        assert_eq!(json, r#""sections.hero.headline""#);
        let back: ConfigPath = serde_json::from_str(&json).unwrap();
        assert_eq!(back, path);
    }
}
