//! Element addressing: from a clicked node back to its configuration path.
//!
//! Rendering components tag each editable output element with a
//! [`ConfigPath`] and a [`NodeKind`].  When a person clicks an element while
//! the page is in edit mode, the page finds the closest tagged element
//! (the target itself or its nearest tagged ancestor) and reports that
//! element's path, kind and bounding box to the host.
//!
//! # Incremental index
//!
//! Instead of walking up the rendered tree on every click, [`AddressIndex`]
//! is maintained as nodes are created and destroyed.  Each node records, at
//! insertion time, the id of its nearest addressable ancestor-or-self.  Since
//! a node's parent always exists before the node itself, that answer is
//! available in O(1) from the parent's entry, and resolving a click is a
//! single lookup regardless of how deep the target is.
//!
//! ```text
//! section (addr: sections.hero)          nearest = section
//!   └─ div (untagged)                    nearest = section
//!        ├─ h1 (addr: …hero.headline)    nearest = h1
//!        └─ span (untagged)              nearest = section
//! ```
//!
//! # Selection
//!
//! At most one node is marked selected.  Selecting a node clears the previous
//! mark; removing the selected node clears the selection.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::document::ConfigPath;
use crate::domain::edit_mode::EditMode;
use crate::protocol::messages::SelectionReport;

/// Element attribute carrying the configuration path.
pub const ATTR_PATH: &str = "data-path";
/// Element attribute carrying the semantic kind.
pub const ATTR_KIND: &str = "data-type";
/// Element attribute present (as `"true"`) on the selected element.
pub const ATTR_SELECTED: &str = "data-selected";

/// Identity of a rendered node, assigned by the rendering surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Semantic kind of an addressable node, used by the host to pick an editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Text,
    Image,
    Button,
    Link,
    Container,
}

impl NodeKind {
    /// Infers the kind from an element's configuration object.
    ///
    /// `href` makes a link, `src` an image, `text` a text node; anything else
    /// is a container.
    pub fn infer(element: &Value) -> Self {
        let has = |key: &str| element.get(key).is_some_and(|v| !v.is_null());
        if has("href") {
            NodeKind::Link
        } else if has("src") {
            NodeKind::Image
        } else if has("text") {
            NodeKind::Text
        } else {
            NodeKind::Container
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Text => "text",
            NodeKind::Image => "image",
            NodeKind::Button => "button",
            NodeKind::Link => "link",
            NodeKind::Container => "container",
        }
    }
}

/// A bounding box in the page's own coordinate space (CSS pixels).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
    pub bottom: f64,
}

impl Rect {
    /// Builds a rect; `bottom` is derived from `top + height`.
    pub fn new(top: f64, left: f64, width: f64, height: f64) -> Self {
        Self {
            top,
            left,
            width,
            height,
            bottom: top + height,
        }
    }

    /// Converts a viewport-relative rect into page coordinates.
    pub fn offset_by(self, scroll: ScrollOffset) -> Self {
        Rect::new(
            self.top + scroll.y,
            self.left + scroll.x,
            self.width,
            self.height,
        )
    }
}

/// Page scroll position at the time of an event.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScrollOffset {
    pub x: f64,
    pub y: f64,
}

/// The metadata attached to an addressable node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub path: ConfigPath,
    pub kind: NodeKind,
}

impl Address {
    pub fn new(path: ConfigPath, kind: NodeKind) -> Self {
        Self { path, kind }
    }

    /// Element attributes for this address.
    pub fn attributes(&self, selected: bool) -> Vec<(&'static str, String)> {
        let mut attrs = vec![
            (ATTR_PATH, self.path.to_string()),
            (ATTR_KIND, self.kind.as_str().to_string()),
        ];
        if selected {
            attrs.push((ATTR_SELECTED, "true".to_string()));
        }
        attrs
    }
}

/// Errors raised while maintaining the index.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressingError {
    #[error("node {0} is already registered")]
    DuplicateNode(NodeId),

    #[error("parent node {0} is not registered")]
    UnknownParent(NodeId),
}

/// What the page should do with a pointer-down event.
#[derive(Debug, Clone, PartialEq)]
pub enum PointerOutcome {
    /// Let the event continue (default action and propagation untouched).
    PassThrough,
    /// Prevent the default action, stop propagation, and send this report.
    Intercepted(SelectionReport),
}

#[derive(Debug)]
struct NodeEntry {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    address: Option<Address>,
    nearest: Option<NodeId>,
    rect: Option<Rect>,
}

/// Index from rendered node identity to configuration address.
#[derive(Debug, Default)]
pub struct AddressIndex {
    nodes: HashMap<NodeId, NodeEntry>,
    selected: Option<NodeId>,
}

impl AddressIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a newly created node.
    ///
    /// # Errors
    ///
    /// [`AddressingError::DuplicateNode`] if `id` is already registered, or
    /// [`AddressingError::UnknownParent`] if `parent` is not.
    pub fn insert(
        &mut self,
        id: NodeId,
        parent: Option<NodeId>,
        address: Option<Address>,
    ) -> Result<(), AddressingError> {
        if self.nodes.contains_key(&id) {
            return Err(AddressingError::DuplicateNode(id));
        }
        let inherited = match parent {
            Some(p) => {
                let parent_entry = self
                    .nodes
                    .get_mut(&p)
                    .ok_or(AddressingError::UnknownParent(p))?;
                parent_entry.children.push(id);
                parent_entry.nearest
            }
            None => None,
        };
        let nearest = if address.is_some() { Some(id) } else { inherited };
        self.nodes.insert(
            id,
            NodeEntry {
                parent,
                children: Vec::new(),
                address,
                nearest,
                rect: None,
            },
        );
        Ok(())
    }

    /// Removes a destroyed node together with its whole subtree.
    ///
    /// Returns the number of nodes removed (0 if `id` was unknown).
    pub fn remove(&mut self, id: NodeId) -> usize {
        let Some(entry) = self.nodes.get(&id) else {
            return 0;
        };
        if let Some(parent) = entry.parent {
            if let Some(parent_entry) = self.nodes.get_mut(&parent) {
                parent_entry.children.retain(|child| *child != id);
            }
        }

        let mut removed = 0;
        let mut pending = vec![id];
        while let Some(next) = pending.pop() {
            if let Some(entry) = self.nodes.remove(&next) {
                removed += 1;
                pending.extend(entry.children);
                if self.selected == Some(next) {
                    self.selected = None;
                }
            }
        }
        removed
    }

    /// Records the viewport-relative bounding box of a node.  Returns `false`
    /// for unknown nodes.
    pub fn set_geometry(&mut self, id: NodeId, rect: Rect) -> bool {
        match self.nodes.get_mut(&id) {
            Some(entry) => {
                entry.rect = Some(rect);
                true
            }
            None => false,
        }
    }

    /// Returns the nearest addressable ancestor-or-self of `target`.
    pub fn resolve(&self, target: NodeId) -> Option<NodeId> {
        self.nodes.get(&target)?.nearest
    }

    pub fn address(&self, id: NodeId) -> Option<&Address> {
        self.nodes.get(&id)?.address.as_ref()
    }

    pub fn geometry(&self, id: NodeId) -> Option<Rect> {
        self.nodes.get(&id)?.rect
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn selected(&self) -> Option<NodeId> {
        self.selected
    }

    pub fn is_selected(&self, id: NodeId) -> bool {
        self.selected == Some(id)
    }

    /// Marks `id` as the selected node, clearing any previous selection.
    ///
    /// Returns the previously selected node.  Unaddressable or unknown nodes
    /// are never marked; in that case the selection is left unchanged and
    /// `None` is returned.
    pub fn select(&mut self, id: NodeId) -> Option<NodeId> {
        if self.address(id).is_none() {
            return None;
        }
        self.selected.replace(id).filter(|prev| *prev != id)
    }

    pub fn clear_selection(&mut self) -> Option<NodeId> {
        self.selected.take()
    }

    /// Element attributes for `id`, including the selection marker.
    ///
    /// Untagged nodes have no attributes.
    pub fn attributes(&self, id: NodeId) -> Vec<(&'static str, String)> {
        self.address(id)
            .map(|address| address.attributes(self.is_selected(id)))
            .unwrap_or_default()
    }

    /// Handles a pointer-down on `target`.
    ///
    /// Outside edit mode, or when no tagged node encloses the target, the
    /// event passes through untouched.  Otherwise the enclosing node becomes
    /// the selection and a report is returned for the host, with the node's
    /// box shifted by `scroll` into page coordinates.
    pub fn handle_pointer_down(
        &mut self,
        target: NodeId,
        mode: EditMode,
        scroll: ScrollOffset,
    ) -> PointerOutcome {
        if !mode.is_enabled() {
            return PointerOutcome::PassThrough;
        }
        let Some(resolved) = self.resolve(target) else {
            debug!("pointer-down on {target}: no addressable ancestor");
            return PointerOutcome::PassThrough;
        };
        let Some(address) = self.address(resolved).cloned() else {
            return PointerOutcome::PassThrough;
        };
        let rect = self.geometry(resolved).unwrap_or_else(|| {
            debug!("node {resolved} has no reported geometry; using an empty rect");
            Rect::default()
        })
        .offset_by(scroll);

        self.select(resolved);
        PointerOutcome::Intercepted(SelectionReport {
            path: address.path,
            kind: address.kind,
            rect,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const NO_SCROLL: ScrollOffset = ScrollOffset { x: 0.0, y: 0.0 };

    fn addr(path: &str, kind: NodeKind) -> Option<Address> {
        Some(Address::new(path.parse().unwrap(), kind))
    }

    /// section(1, sections.hero) > div(2) > [h1(3, sections.hero.headline), span(4)]
    fn hero_tree() -> AddressIndex {
        let mut index = AddressIndex::new();
        index
            .insert(NodeId(1), None, addr("sections.hero", NodeKind::Container))
            .unwrap();
        index.insert(NodeId(2), Some(NodeId(1)), None).unwrap();
        index
            .insert(
                NodeId(3),
                Some(NodeId(2)),
                addr("sections.hero.headline", NodeKind::Text),
            )
            .unwrap();
        index.insert(NodeId(4), Some(NodeId(2)), None).unwrap();
        index
    }

    fn report_path(outcome: &PointerOutcome) -> String {
        match outcome {
            PointerOutcome::Intercepted(report) => report.path.to_string(),
            PointerOutcome::PassThrough => panic!("expected interception"),
        }
    }

    #[test]
    fn test_resolve_exact_target() {
        let index = hero_tree();
        assert_eq!(index.resolve(NodeId(3)), Some(NodeId(3)));
    }

    #[test]
    fn test_resolve_walks_to_nearest_tagged_ancestor() {
        let index = hero_tree();
        assert_eq!(index.resolve(NodeId(4)), Some(NodeId(1)));
        assert_eq!(index.resolve(NodeId(2)), Some(NodeId(1)));
    }

    #[test]
    fn test_resolve_untagged_root_is_none() {
        let mut index = AddressIndex::new();
        index.insert(NodeId(10), None, None).unwrap();
        index.insert(NodeId(11), Some(NodeId(10)), None).unwrap();
        assert_eq!(index.resolve(NodeId(11)), None);
        assert_eq!(index.resolve(NodeId(99)), None);
    }

    #[test]
    fn test_insert_rejects_duplicates_and_unknown_parents() {
        let mut index = hero_tree();
        assert_eq!(
            index.insert(NodeId(1), None, None),
            Err(AddressingError::DuplicateNode(NodeId(1)))
        );
        assert_eq!(
            index.insert(NodeId(50), Some(NodeId(49)), None),
            Err(AddressingError::UnknownParent(NodeId(49)))
        );
    }

    #[test]
    fn test_remove_drops_whole_subtree() {
        let mut index = hero_tree();
        assert_eq!(index.remove(NodeId(2)), 3);
        assert_eq!(index.len(), 1);
        assert!(!index.contains(NodeId(3)));
        assert_eq!(index.remove(NodeId(2)), 0);
        // The id can be reused after removal.
        index.insert(NodeId(2), Some(NodeId(1)), None).unwrap();
        assert_eq!(index.resolve(NodeId(2)), Some(NodeId(1)));
    }

    #[test]
    fn test_pointer_down_in_edit_mode_reports_nearest_path() {
        let mut index = hero_tree();
        index.set_geometry(NodeId(3), Rect::new(100.0, 20.0, 400.0, 60.0));

        let outcome = index.handle_pointer_down(NodeId(3), EditMode::Enabled, NO_SCROLL);
        match &outcome {
            PointerOutcome::Intercepted(report) => {
                assert_eq!(report.path.to_string(), "sections.hero.headline");
                assert_eq!(report.kind, NodeKind::Text);
                assert_eq!(report.rect.bottom, 160.0);
            }
            PointerOutcome::PassThrough => panic!("expected interception"),
        }

        let outcome = index.handle_pointer_down(NodeId(4), EditMode::Enabled, NO_SCROLL);
        assert_eq!(report_path(&outcome), "sections.hero");
    }

    #[test]
    fn test_report_rect_includes_scroll_offset() {
        let mut index = hero_tree();
        index.set_geometry(NodeId(3), Rect::new(10.0, 5.0, 100.0, 20.0));
        let scroll = ScrollOffset { x: 0.0, y: 640.0 };

        match index.handle_pointer_down(NodeId(3), EditMode::Enabled, scroll) {
            PointerOutcome::Intercepted(report) => {
                assert_eq!(report.rect, Rect::new(650.0, 5.0, 100.0, 20.0));
            }
            PointerOutcome::PassThrough => panic!("expected interception"),
        }
    }

    #[test]
    fn test_pointer_down_outside_edit_mode_passes_through() {
        let mut index = hero_tree();
        let outcome = index.handle_pointer_down(NodeId(3), EditMode::Disabled, NO_SCROLL);
        assert_eq!(outcome, PointerOutcome::PassThrough);
        assert_eq!(index.selected(), None);
    }

    #[test]
    fn test_pointer_down_without_tagged_ancestor_is_noop() {
        let mut index = AddressIndex::new();
        index.insert(NodeId(1), None, None).unwrap();
        let outcome = index.handle_pointer_down(NodeId(1), EditMode::Enabled, NO_SCROLL);
        assert_eq!(outcome, PointerOutcome::PassThrough);
        assert_eq!(index.selected(), None);
    }

    #[test]
    fn test_selection_is_exclusive() {
        let mut index = hero_tree();
        index.handle_pointer_down(NodeId(3), EditMode::Enabled, NO_SCROLL);
        index.handle_pointer_down(NodeId(4), EditMode::Enabled, NO_SCROLL);

        let marked: Vec<NodeId> = [NodeId(1), NodeId(2), NodeId(3), NodeId(4)]
            .into_iter()
            .filter(|id| index.is_selected(*id))
            .collect();
        assert_eq!(marked, vec![NodeId(1)]);
        assert_eq!(
            index.attributes(NodeId(1)),
            vec![
                (ATTR_PATH, "sections.hero".to_string()),
                (ATTR_KIND, "container".to_string()),
                (ATTR_SELECTED, "true".to_string()),
            ]
        );
        assert_eq!(index.attributes(NodeId(3)).len(), 2);
    }

    #[test]
    fn test_select_returns_previous_selection() {
        let mut index = hero_tree();
        assert_eq!(index.select(NodeId(3)), None);
        assert_eq!(index.select(NodeId(1)), Some(NodeId(3)));
        assert_eq!(index.select(NodeId(1)), None);
        // Untagged nodes are never selected.
        assert_eq!(index.select(NodeId(2)), None);
        assert_eq!(index.selected(), Some(NodeId(1)));
    }

    #[test]
    fn test_removing_selected_node_clears_selection() {
        let mut index = hero_tree();
        index.select(NodeId(3));
        index.remove(NodeId(3));
        assert_eq!(index.selected(), None);
    }

    #[test]
    fn test_missing_geometry_reports_empty_rect() {
        let mut index = hero_tree();
        match index.handle_pointer_down(NodeId(3), EditMode::Enabled, NO_SCROLL) {
            PointerOutcome::Intercepted(report) => assert_eq!(report.rect, Rect::default()),
            PointerOutcome::PassThrough => panic!("expected interception"),
        }
    }

    #[test]
    fn test_untagged_nodes_have_no_attributes() {
        let index = hero_tree();
        assert!(index.attributes(NodeId(2)).is_empty());
    }

    #[test]
    fn test_kind_inference() {
        assert_eq!(NodeKind::infer(&json!({"text": "Go", "href": "/x"})), NodeKind::Link);
        assert_eq!(NodeKind::infer(&json!({"src": "/a.png"})), NodeKind::Image);
        assert_eq!(NodeKind::infer(&json!({"text": "Hi"})), NodeKind::Text);
        assert_eq!(NodeKind::infer(&json!({"styles": {}})), NodeKind::Container);
        assert_eq!(NodeKind::infer(&json!({"href": null})), NodeKind::Container);
    }
}
