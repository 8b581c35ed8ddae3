//! The built-in base document.
//!
//! The base is compiled into the binary so it is available synchronously at
//! startup, before any template override has been fetched.  Template
//! overrides are merged on top of it.

use serde_json::{json, Value};

use super::Document;

/// Identifier of the template that uses the base document unchanged.
pub const BUILTIN_TEMPLATE_ID: &str = "default";

const BASE_CONFIG_JSON: &str = include_str!("../../assets/base_config.json");

/// Returns the built-in base document.
///
/// Falls back to [`fallback_document`] if the embedded JSON is not an object,
/// so callers always receive a usable document.
pub fn builtin_base() -> Document {
    match serde_json::from_str::<Value>(BASE_CONFIG_JSON)
        .map_err(|e| e.to_string())
        .and_then(|value| Document::from_value(value).map_err(|e| e.to_string()))
    {
        Ok(doc) => doc,
        Err(e) => {
            tracing::error!("built-in base document is unusable ({e}); using fallback");
            fallback_document()
        }
    }
}

/// Minimal document with every reserved region present but empty.
pub fn fallback_document() -> Document {
    let value = json!({
        "meta": { "siteName": "Fallback Site" },
        "theme": { "primary": "#000000" },
        "layout": { "order": [] },
        "sections": {}
    });
    match value {
        Value::Object(map) => Document::new(map),
        _ => Document::default(),
    }
}
