//! JSON codec for the host/page channel.
//!
//! Decoding is where inbound frames are validated.  A frame that fails any
//! check is reported as a [`ProtocolError`]; the caller logs it and drops the
//! frame, keeping whatever state it had before.  Nothing in here panics on
//! hostile input.

use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::document::{json_kind, Document};
use crate::protocol::messages::{
    HostToPageMsg, ModeSetPayload, PageToHostMsg, TAG_CONFIG_REPLACE, TAG_MODE_SET,
    TAG_READY_SIGNAL, TAG_SELECTION_REPORT,
};

/// Errors produced while decoding or encoding frames.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ProtocolError {
    /// The frame was not a JSON object with a string `type` field.
    #[error("malformed frame: {0}")]
    MalformedFrame(String),

    /// The `type` field names no known message.
    #[error("unknown message type '{0}'")]
    UnknownType(String),

    /// The message is valid but only travels in the other direction.
    #[error("message type '{0}' is not accepted in this direction")]
    WrongDirection(String),

    /// A message that requires a payload arrived without one (or with `null`).
    #[error("'{0}' message is missing its payload")]
    MissingPayload(&'static str),

    /// A `config-replace` payload that is not an object.
    #[error("config-replace payload must be an object, got {0}")]
    NotAnObject(&'static str),

    /// A `config-replace` payload that is an empty object.
    #[error("config-replace payload is an empty object")]
    EmptyDocument,

    /// A `mode-set` payload that does not match `{ "mode": "edit" | "view" }`.
    #[error("invalid mode-set payload: {0}")]
    InvalidMode(String),

    /// Serialization of an outbound message failed.
    #[error("failed to encode message: {0}")]
    Encode(String),
}

#[derive(Deserialize)]
struct RawFrame {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Option<Value>,
}

/// Decodes and validates a frame sent by the host.
///
/// # Errors
///
/// Returns a [`ProtocolError`] describing the first check that failed.
///
/// # Example
///
/// ```rust
/// use sitesync_core::protocol::{decode_host_message, HostToPageMsg, ProtocolError};
///
/// let msg = decode_host_message(r#"{"type":"mode-set","payload":{"mode":"edit"}}"#).unwrap();
/// assert!(matches!(msg, HostToPageMsg::ModeSet(_)));
///
/// let err = decode_host_message(r#"{"type":"config-replace","payload":{}}"#).unwrap_err();
/// assert_eq!(err, ProtocolError::EmptyDocument);
/// ```
pub fn decode_host_message(text: &str) -> Result<HostToPageMsg, ProtocolError> {
    let frame: RawFrame =
        serde_json::from_str(text).map_err(|e| ProtocolError::MalformedFrame(e.to_string()))?;
    let payload = frame.payload.filter(|p| !p.is_null());

    match frame.kind.as_str() {
        TAG_CONFIG_REPLACE => {
            let payload = payload.ok_or(ProtocolError::MissingPayload(TAG_CONFIG_REPLACE))?;
            let document = validate_document(payload)?;
            Ok(HostToPageMsg::ConfigReplace(document))
        }
        TAG_MODE_SET => {
            let payload = payload.ok_or(ProtocolError::MissingPayload(TAG_MODE_SET))?;
            let parsed: ModeSetPayload = serde_json::from_value(payload)
                .map_err(|e| ProtocolError::InvalidMode(e.to_string()))?;
            Ok(HostToPageMsg::ModeSet(parsed.mode))
        }
        TAG_SELECTION_REPORT | TAG_READY_SIGNAL => Err(ProtocolError::WrongDirection(frame.kind)),
        _ => Err(ProtocolError::UnknownType(frame.kind)),
    }
}

/// Checks that a replacement payload is a non-empty object.
///
/// # Errors
///
/// [`ProtocolError::NotAnObject`] or [`ProtocolError::EmptyDocument`].
pub fn validate_document(payload: Value) -> Result<Document, ProtocolError> {
    let kind = json_kind(&payload);
    let document =
        Document::from_value(payload).map_err(|_| ProtocolError::NotAnObject(kind))?;
    if document.is_empty() {
        return Err(ProtocolError::EmptyDocument);
    }
    Ok(document)
}

/// Encodes a page → host message as a JSON text frame.
///
/// # Errors
///
/// Returns [`ProtocolError::Encode`] if serialization fails.
pub fn encode_page_message(msg: &PageToHostMsg) -> Result<String, ProtocolError> {
    serde_json::to_string(msg).map_err(|e| ProtocolError::Encode(e.to_string()))
}

/// Encodes a host → page message as a JSON text frame.
///
/// Used by hosts written in Rust and by tests.
///
/// # Errors
///
/// Returns [`ProtocolError::Encode`] if serialization fails.
pub fn encode_host_message(msg: &HostToPageMsg) -> Result<String, ProtocolError> {
    let value = match msg {
        HostToPageMsg::ConfigReplace(document) => json!({
            "type": TAG_CONFIG_REPLACE,
            "payload": document,
        }),
        HostToPageMsg::ModeSet(mode) => json!({
            "type": TAG_MODE_SET,
            "payload": ModeSetPayload { mode: *mode },
        }),
    };
    serde_json::to_string(&value).map_err(|e| ProtocolError::Encode(e.to_string()))
}

/// Decodes a frame sent by the page (host side of the channel).
///
/// # Errors
///
/// Returns [`ProtocolError::MalformedFrame`] when the frame does not match any
/// page → host message.
pub fn decode_page_message(text: &str) -> Result<PageToHostMsg, ProtocolError> {
    serde_json::from_str(text).map_err(|e| ProtocolError::MalformedFrame(e.to_string()))
}
