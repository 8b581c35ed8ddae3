//! Message types exchanged between the page and its hosting editor.
//!
//! Every frame on the wire is a JSON object with a `"type"` discriminant and,
//! for messages that carry data, a `"payload"` field:
//!
//! ```json
//! {"type":"config-replace","payload":{"sections":{"hero":{}}}}
//! {"type":"mode-set","payload":{"mode":"edit"}}
//! {"type":"selection-report","payload":{"path":"sections.hero.headline","kind":"text","rect":{"top":10.0,"left":0.0,"width":200.0,"height":40.0,"bottom":50.0}}}
//! {"type":"ready-signal"}
//! ```
//!
//! The two directions use separate enums so a page-only message can never be
//! accepted from the host, and vice versa.  Messages are fire-and-forget: none
//! of them is acknowledged.

use serde::{Deserialize, Serialize};

use crate::document::{ConfigPath, Document};
use crate::domain::addressing::{NodeKind, Rect};

/// Wire tag of the host → page document replacement.
pub const TAG_CONFIG_REPLACE: &str = "config-replace";
/// Wire tag of the host → page mode change.
pub const TAG_MODE_SET: &str = "mode-set";
/// Wire tag of the page → host selection report.
pub const TAG_SELECTION_REPORT: &str = "selection-report";
/// Wire tag of the page → host readiness announcement.
pub const TAG_READY_SIGNAL: &str = "ready-signal";

/// Mode requested by the host in a `mode-set` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestedMode {
    /// Intercept pointer interactions for element selection.
    Edit,
    /// Ordinary navigation.
    View,
}

/// Body of a `mode-set` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModeSetPayload {
    pub mode: RequestedMode,
}

/// A validated message from the host.
///
/// Instances only exist after [`decode_host_message`] has checked the frame,
/// so a `ConfigReplace` always carries a non-empty object.
///
/// [`decode_host_message`]: crate::protocol::decode_host_message
#[derive(Debug, Clone, PartialEq)]
pub enum HostToPageMsg {
    /// Replace the whole configuration document.
    ConfigReplace(Document),
    /// Switch edit mode on or off.
    ModeSet(RequestedMode),
}

impl HostToPageMsg {
    /// Wire tag for logging; never includes payload contents.
    pub fn type_name(&self) -> &'static str {
        match self {
            HostToPageMsg::ConfigReplace(_) => TAG_CONFIG_REPLACE,
            HostToPageMsg::ModeSet(_) => TAG_MODE_SET,
        }
    }
}

/// Body of a `selection-report` message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionReport {
    /// Configuration path of the selected element.
    pub path: ConfigPath,
    /// Semantic kind of the selected element.
    pub kind: NodeKind,
    /// Bounding box in the page's own coordinate space.
    pub rect: Rect,
}

/// Messages the page sends to its host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum PageToHostMsg {
    /// An element was clicked in edit mode.
    SelectionReport(SelectionReport),
    /// The page is embedded and ready for `config-replace` / `mode-set`.
    ReadySignal,
}

impl PageToHostMsg {
    pub fn type_name(&self) -> &'static str {
        match self {
            PageToHostMsg::SelectionReport(_) => TAG_SELECTION_REPORT,
            PageToHostMsg::ReadySignal => TAG_READY_SIGNAL,
        }
    }
}
