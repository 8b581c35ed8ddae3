//! Render-surface messages and the page event queue.
//!
//! The render surface is the process that actually draws the page (a browser
//! shim, a headless renderer, a test).  It connects on `/surface` and keeps
//! the page informed about the rendered tree:
//!
//! ```json
//! {"type":"mount","payload":{"embedded":true}}
//! {"type":"node-created","payload":{"id":3,"parent":1,"path":"sections.hero.headline","kind":"text"}}
//! {"type":"geometry","payload":{"id":3,"rect":{"top":120.0,"left":16.0,"width":300.0,"height":48.0,"bottom":168.0}}}
//! {"type":"pointer-down","payload":{"target":3,"scroll":{"x":0.0,"y":0.0}}}
//! {"type":"node-removed","payload":{"id":3}}
//! {"type":"unmount"}
//! ```
//!
//! The page answers with [`SurfaceCommand`]s: what to render, whether to
//! intercept clicks, and which node carries the selection marker.
//!
//! Every inbound source (hosts, the surface, the startup override fetch) is
//! funneled into one queue of [`PageEvent`]s processed by a single task.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use sitesync_core::{ConfigPath, Document, NodeId, NodeKind, Rect, ScrollOffset};

/// Identity of one WebSocket connection (host or surface).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Events reported by the render surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum SurfaceEvent {
    /// The page finished its first render.
    Mount { embedded: bool },
    /// A node was added to the rendered tree.
    NodeCreated {
        id: NodeId,
        #[serde(default)]
        parent: Option<NodeId>,
        #[serde(default)]
        path: Option<ConfigPath>,
        #[serde(default)]
        kind: Option<NodeKind>,
    },
    /// A node (and its subtree) left the rendered tree.
    NodeRemoved { id: NodeId },
    /// A node's viewport-relative bounding box.
    Geometry { id: NodeId, rect: Rect },
    /// A pointer-down landed on `target`.
    PointerDown {
        target: NodeId,
        #[serde(default)]
        scroll: ScrollOffset,
    },
    /// The page is being torn down.
    Unmount,
}

impl SurfaceEvent {
    pub fn type_name(&self) -> &'static str {
        match self {
            SurfaceEvent::Mount { .. } => "mount",
            SurfaceEvent::NodeCreated { .. } => "node-created",
            SurfaceEvent::NodeRemoved { .. } => "node-removed",
            SurfaceEvent::Geometry { .. } => "geometry",
            SurfaceEvent::PointerDown { .. } => "pointer-down",
            SurfaceEvent::Unmount => "unmount",
        }
    }
}

/// Instructions sent back to the render surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "kebab-case")]
pub enum SurfaceCommand {
    /// Render this document; `sections` is the ordered list of sections to
    /// draw (missing sections already skipped).
    Render {
        revision: u64,
        sections: Vec<String>,
        document: Document,
    },
    /// Whether clicks are intercepted and hover affordances shown.
    EditMode { enabled: bool },
    /// The pointer-down on `target` was handled: `intercepted` means prevent
    /// the default action and stop propagation.
    PointerHandled { target: NodeId, intercepted: bool },
    /// Move the selection marker.  `attributes` are the element attributes of
    /// the newly selected node.
    Selection {
        selected: Option<NodeId>,
        previous: Option<NodeId>,
        attributes: Vec<(String, String)>,
    },
}

/// One item in the page event queue.
#[derive(Debug)]
pub enum PageEvent {
    /// A text frame from an attached host.
    HostFrame {
        connection: ConnectionId,
        origin: Option<String>,
        text: String,
    },
    /// A decoded event from the render surface.
    Surface(SurfaceEvent),
    /// The startup template override finished resolving.  `base_revision`
    /// is the store revision of the base document it was merged onto.
    OverrideResolved {
        document: Arc<Document>,
        base_revision: u64,
    },
    /// Stop the event loop.
    Shutdown,
}
