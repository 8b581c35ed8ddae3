//! # sitesync-core
//!
//! Shared library for the live-editing page runtime: the configuration
//! document model, template resolution rules, the host/page message protocol
//! and the element addressing index.
//!
//! It has zero dependencies on sockets, files or async runtimes; everything
//! here is plain data and pure functions.
//!
//! # Architecture overview (for beginners)
//!
//! A site is rendered entirely from one JSON **configuration document**.  An
//! external visual editor (the **host**) embeds the rendered page, pushes
//! replacement documents into it, and receives a report whenever the user
//! clicks an element in edit mode.
//!
//! - **`document`** – The document itself: typed access by dotted path, the
//!   built-in base document and the deep-merge used to apply template
//!   overrides.
//!
//! - **`template`** – Template identifiers and the priority order used to pick
//!   one (request parameter, persisted preference, environment default,
//!   built-in).
//!
//! - **`protocol`** – The JSON messages exchanged with the host, their codec
//!   and the origin policy applied to them.
//!
//! - **`domain`** – Page-side state: the node addressing index, the edit-mode
//!   controller and the blog post list.

pub mod document;
pub mod domain;
pub mod protocol;
pub mod template;

// Re-export the most-used types at the crate root so callers can write
// `sitesync_core::Document` instead of `sitesync_core::document::Document`.
pub use document::{
    builtin_base, fallback_document, ConfigPath, Document, DocumentError, PathError, Segment,
};
pub use domain::addressing::{
    Address, AddressIndex, AddressingError, NodeId, NodeKind, PointerOutcome, Rect, ScrollOffset,
};
pub use domain::edit_mode::{EditMode, EditModeController, EmbeddingContext};
pub use domain::posts::{Post, PostCollection};
pub use protocol::codec::{decode_host_message, encode_page_message, ProtocolError};
pub use protocol::messages::{HostToPageMsg, PageToHostMsg, RequestedMode, SelectionReport};
pub use protocol::origin::{OriginPolicy, TargetOrigin};
pub use template::{
    resolve_descriptor, TemplateCandidates, TemplateDescriptor, TemplateError, TemplateSource,
};
