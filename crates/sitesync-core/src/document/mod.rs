//! The configuration document model.
//!
//! A [`Document`] is the JSON value describing an entire site: metadata,
//! theme, the `layout` region (section ordering) and the `sections` region
//! (content keyed by section name).  Everything else in the system reads or
//! replaces documents.
//!
//! # Invariant
//!
//! A document is always a JSON object at the root.  The type enforces this:
//! the only ways to obtain one are from a `Map`, or through
//! [`Document::from_value`], which rejects every non-object value.
//!
//! # Sub-modules
//!
//! - **`path`**  – [`ConfigPath`], the dotted address of one field.
//! - **`merge`** – the template override deep merge.
//! - **`base`**  – the built-in base document compiled into the binary.

pub mod base;
pub mod merge;
pub mod path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

pub use base::{builtin_base, fallback_document, BUILTIN_TEMPLATE_ID};
pub use path::{ConfigPath, PathError, Segment};

/// Section names rendered, in this order, when `layout.order` is absent.
pub const DEFAULT_SECTION_ORDER: [&str; 4] = ["hero", "features", "testimonials", "faq"];

/// Errors raised when building or editing a document.
#[derive(Debug, Error, PartialEq)]
pub enum DocumentError {
    /// The root value was not a JSON object.
    #[error("document root must be an object, got {0}")]
    NotAnObject(&'static str),

    /// A write traversed through a value that is neither a mapping nor a
    /// sequence.
    #[error("cannot descend into {kind} at '{at}'")]
    NotAContainer { at: String, kind: &'static str },

    /// A write addressed a sequence position that does not exist.
    #[error("index {index} out of range at '{at}' (length {len})")]
    IndexOutOfRange { at: String, index: usize, len: usize },

    /// A write addressed the root itself with a non-object value.
    #[error("the document root can only be replaced by an object")]
    RootReplacement,
}

/// A configuration document (JSON object at the root).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct Document(Map<String, Value>);

impl Document {
    pub fn new(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Builds a document from an arbitrary JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::NotAnObject`] for anything but an object.
    pub fn from_value(value: Value) -> Result<Self, DocumentError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(DocumentError::NotAnObject(json_kind(&other))),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Returns the value at `path`, or `None` when any segment is missing.
    pub fn get(&self, path: &ConfigPath) -> Option<&Value> {
        let mut segments = path.segments().iter();
        let mut current = match segments.next() {
            None => return None,
            Some(Segment::Key(key)) => self.0.get(key)?,
            Some(Segment::Index(index)) => self.0.get(&index.to_string())?,
        };
        for segment in segments {
            current = match (segment, current) {
                (Segment::Key(key), Value::Object(map)) => map.get(key)?,
                (Segment::Index(index), Value::Array(items)) => items.get(*index)?,
                (Segment::Index(index), Value::Object(map)) => map.get(&index.to_string())?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Writes `value` at `path`, creating intermediate mappings as needed.
    ///
    /// Sequences are never grown: writing to a position past the end is an
    /// error, as is descending through a scalar.
    ///
    /// # Errors
    ///
    /// See [`DocumentError`].
    pub fn set(&mut self, path: &ConfigPath, value: Value) -> Result<(), DocumentError> {
        let Some((last, parents)) = path.segments().split_last() else {
            return match value {
                Value::Object(map) => {
                    self.0 = map;
                    Ok(())
                }
                _ => Err(DocumentError::RootReplacement),
            };
        };

        // Stage the write on a copy so a failure leaves the document as it was.
        let mut staged = Value::Object(self.0.clone());
        let mut walked = ConfigPath::root();
        set_within(&mut staged, parents, last, value, &mut walked)?;
        if let Value::Object(map) = staged {
            self.0 = map;
        }
        Ok(())
    }

    /// Returns this document with `overlay` deep-merged on top.
    ///
    /// See [`merge`] for the rules.
    pub fn with_override(&self, overlay: &Document) -> Document {
        Document(merge::merged(&self.0, &overlay.0))
    }

    /// Returns the sections to render, in order.
    ///
    /// The order comes from `layout.order`, falling back to
    /// [`DEFAULT_SECTION_ORDER`].  Names whose section data is missing or
    /// `null` are skipped so one absent section never blanks the page.
    pub fn section_plan(&self) -> Vec<(String, &Value)> {
        let sections = self.0.get("sections").and_then(Value::as_object);
        let order: Vec<String> = self
            .0
            .get("layout")
            .and_then(|layout| layout.get("order"))
            .and_then(Value::as_array)
            .map(|names| {
                names
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_else(|| DEFAULT_SECTION_ORDER.iter().map(|s| s.to_string()).collect());

        order
            .into_iter()
            .filter_map(|name| {
                let data = sections?.get(&name)?;
                if data.is_null() {
                    tracing::debug!(section = %name, "section has no data; skipping");
                    return None;
                }
                Some((name, data))
            })
            .collect()
    }
}

fn set_within(
    current: &mut Value,
    parents: &[Segment],
    last: &Segment,
    value: Value,
    walked: &mut ConfigPath,
) -> Result<(), DocumentError> {
    let mut node = current;
    for segment in parents {
        node = descend(node, segment, walked)?;
    }
    match (last, node) {
        (Segment::Key(key), Value::Object(map)) => {
            map.insert(key.clone(), value);
            Ok(())
        }
        (Segment::Index(index), Value::Array(items)) => {
            let len = items.len();
            let slot = items.get_mut(*index).ok_or(DocumentError::IndexOutOfRange {
                at: walked.to_string(),
                index: *index,
                len,
            })?;
            *slot = value;
            Ok(())
        }
        (Segment::Index(index), Value::Object(map)) => {
            map.insert(index.to_string(), value);
            Ok(())
        }
        (_, other) => Err(DocumentError::NotAContainer {
            at: walked.to_string(),
            kind: json_kind(other),
        }),
    }
}

fn descend<'a>(
    node: &'a mut Value,
    segment: &Segment,
    walked: &mut ConfigPath,
) -> Result<&'a mut Value, DocumentError> {
    let at = walked.to_string();
    let next = match (segment, node) {
        (Segment::Key(key), Value::Object(map)) => {
            *walked = walked.child(key.clone());
            map.entry(key.clone())
                .or_insert_with(|| Value::Object(Map::new()))
        }
        (Segment::Index(index), Value::Array(items)) => {
            *walked = walked.index(*index);
            let len = items.len();
            items.get_mut(*index).ok_or(DocumentError::IndexOutOfRange {
                at,
                index: *index,
                len,
            })?
        }
        (Segment::Index(index), Value::Object(map)) => {
            *walked = walked.index(*index);
            map.entry(index.to_string())
                .or_insert_with(|| Value::Object(Map::new()))
        }
        (_, other) => {
            return Err(DocumentError::NotAContainer {
                at,
                kind: json_kind(other),
            })
        }
    };
    Ok(next)
}

impl From<Map<String, Value>> for Document {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl TryFrom<Value> for Document {
    type Error = DocumentError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}

impl From<Document> for Value {
    fn from(doc: Document) -> Self {
        doc.into_value()
    }
}

/// Returns a short human-readable name for the kind of a JSON value.
pub fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        Document::from_value(value).unwrap()
    }

    fn path(raw: &str) -> ConfigPath {
        raw.parse().unwrap()
    }

    #[test]
    fn test_from_value_rejects_non_objects() {
        assert_eq!(
            Document::from_value(json!([1, 2])),
            Err(DocumentError::NotAnObject("array"))
        );
        assert_eq!(
            Document::from_value(Value::Null),
            Err(DocumentError::NotAnObject("null"))
        );
        assert!(Document::from_value(json!({})).unwrap().is_empty());
    }

    #[test]
    fn test_deserialize_rejects_non_object_root() {
        let result: Result<Document, _> = serde_json::from_str("\"hello\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_get_walks_mappings_and_sequences() {
        let d = doc(json!({
            "sections": {"features": {"items": [{"title": "One"}, {"title": "Two"}]}}
        }));
        assert_eq!(
            d.get(&path("sections.features.items.1.title")),
            Some(&json!("Two"))
        );
        assert_eq!(d.get(&path("sections.features.items.5.title")), None);
        assert_eq!(d.get(&path("sections.missing")), None);
        assert_eq!(d.get(&ConfigPath::root()), None);
    }

    #[test]
    fn test_get_reaches_zero_padded_mapping_key() {
        let d = doc(json!({"sections": {"faq": {"items": {"01": "padded", "1": "plain"}}}}));
        assert_eq!(d.get(&path("sections.faq.items.01")), Some(&json!("padded")));
        assert_eq!(d.get(&path("sections.faq.items.1")), Some(&json!("plain")));
    }

    #[test]
    fn test_set_creates_intermediate_mappings() {
        let mut d = doc(json!({"sections": {}}));
        d.set(&path("sections.blog.posts"), json!([{"slug": "a"}]))
            .unwrap();
        assert_eq!(d.get(&path("sections.blog.posts.0.slug")), Some(&json!("a")));
    }

    #[test]
    fn test_set_replaces_existing_sequence_element() {
        let mut d = doc(json!({"items": ["a", "b"]}));
        d.set(&path("items.1"), json!("z")).unwrap();
        assert_eq!(d.get(&path("items")), Some(&json!(["a", "z"])));
    }

    #[test]
    fn test_set_past_end_of_sequence_fails() {
        let mut d = doc(json!({"items": ["a"]}));
        let err = d.set(&path("items.3"), json!("z")).unwrap_err();
        assert!(matches!(err, DocumentError::IndexOutOfRange { index: 3, len: 1, .. }));
        // The document is unchanged by a failed write.
        assert_eq!(d.get(&path("items")), Some(&json!(["a"])));
    }

    #[test]
    fn test_set_through_scalar_fails() {
        let mut d = doc(json!({"meta": "flat"}));
        let err = d.set(&path("meta.siteName"), json!("x")).unwrap_err();
        assert!(matches!(err, DocumentError::NotAContainer { kind: "string", .. }));
    }

    #[test]
    fn test_set_root_requires_object() {
        let mut d = doc(json!({"a": 1}));
        assert_eq!(
            d.set(&ConfigPath::root(), json!(3)),
            Err(DocumentError::RootReplacement)
        );
        d.set(&ConfigPath::root(), json!({"b": 2})).unwrap();
        assert_eq!(d, doc(json!({"b": 2})));
    }

    #[test]
    fn test_section_plan_follows_layout_order_and_skips_missing() {
        let d = doc(json!({
            "layout": {"order": ["faq", "pricing", "hero", "cta"]},
            "sections": {"hero": {"title": "h"}, "faq": {"items": []}, "cta": null}
        }));
        let names: Vec<String> = d.section_plan().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["faq", "hero"]);
    }

    #[test]
    fn test_section_plan_defaults_when_layout_missing() {
        let d = doc(json!({
            "sections": {"testimonials": {}, "hero": {}, "blog": {}}
        }));
        let names: Vec<String> = d.section_plan().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["hero", "testimonials"]);
    }

    #[test]
    fn test_section_plan_without_sections_is_empty() {
        let d = doc(json!({"layout": {"order": ["hero"]}}));
        assert!(d.section_plan().is_empty());
    }
}
