//! Deep merge of a template override onto the base document.
//!
//! Rules, applied to every key of the override:
//!
//! 1. An override sequence replaces the base value wholesale.  Sequences are
//!    never merged element by element, so an override cannot express a partial
//!    list edit.
//! 2. When both sides are mappings, merge recursively.
//! 3. Anything else: the override value replaces the base value, including a
//!    mapping replaced by a scalar and vice versa.
//!
//! Keys present only in the base are kept untouched.

use serde_json::{Map, Value};

/// Merges `overlay` into `base` in place.
pub fn merge_into(base: &mut Map<String, Value>, overlay: &Map<String, Value>) {
    for (key, incoming) in overlay {
        match (base.get_mut(key), incoming) {
            (_, Value::Array(_)) => {
                base.insert(key.clone(), incoming.clone());
            }
            (Some(Value::Object(existing)), Value::Object(nested)) => {
                merge_into(existing, nested);
            }
            _ => {
                base.insert(key.clone(), incoming.clone());
            }
        }
    }
}

/// Returns a new mapping holding `overlay` merged onto `base`.
pub fn merged(base: &Map<String, Value>, overlay: &Map<String, Value>) -> Map<String, Value> {
    let mut out = base.clone();
    merge_into(&mut out, overlay);
    out
}
