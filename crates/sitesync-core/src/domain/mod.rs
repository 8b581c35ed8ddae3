//! Domain entities for the live-editing page.
//!
//! This module contains pure page-side logic with no infrastructure
//! dependencies: no sockets, no files, no clocks.
//!
//! # What lives here (for beginners)
//!
//! The page renders a configuration document into a tree of output nodes.
//! While an editor hosts the page, three small pieces of state decide how the
//! page reacts to that editor:
//!
//! - **`addressing`** maps a rendered node back to the configuration path it
//!   was rendered from, and tracks which node is currently selected.
//! - **`edit_mode`** decides whether clicks select elements or navigate.
//! - **`posts`** holds the blog entries that are seeded into the document.
//!
//! Code in outer layers (the page runtime, the WebSocket server) depends on
//! these types, but they never depend on the outer layers.

/// Node → configuration path index and selection state.
///
/// See [`addressing::AddressIndex`] for the main type.
pub mod addressing;

/// The `disabled` / `enabled` edit-mode state machine.
pub mod edit_mode;

/// Blog post list model.
pub mod posts;
