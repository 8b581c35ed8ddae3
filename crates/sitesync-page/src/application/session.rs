//! The page session: one event loop for everything the page reacts to.
//!
//! Host frames, render-surface events and the startup override all arrive as
//! [`PageEvent`]s on a single queue and are handled one at a time, in arrival
//! order.  No two events are ever processed concurrently, so the edit-mode
//! controller and the address index need no locking.
//!
//! ```text
//!  /host frames ──┐
//!  /surface events ├──▶ mpsc<PageEvent> ──▶ PageSession::handle ──▶ OutboundSink
//!  override fetch ─┘                              │
//!                                                 └──▶ ConfigStore (replace / initialize)
//! ```
//!
//! Rendering is driven by the store: the infrastructure layer subscribes to
//! [`ConfigStore::subscribe`] and pushes a render command to the surface on
//! every accepted write.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use sitesync_core::protocol::{decode_host_message, HostToPageMsg, OriginPolicy, PageToHostMsg};
use sitesync_core::{
    Address, AddressIndex, Document, EditModeController, EmbeddingContext, NodeKind,
    PointerOutcome, RequestedMode,
};

use crate::application::store::ConfigStore;
use crate::domain::events::{PageEvent, SurfaceCommand, SurfaceEvent};

/// Where the session's outbound messages go.
pub trait OutboundSink: Send + Sync {
    /// Delivers a message to the attached hosts allowed by the target origin.
    fn send_to_hosts(&self, msg: &PageToHostMsg);
    /// Delivers a command to the attached render surfaces.
    fn send_to_surface(&self, cmd: &SurfaceCommand);
}

/// Messages produced by handling one event.
#[derive(Debug, Default, PartialEq)]
pub struct SessionOutput {
    pub to_hosts: Vec<PageToHostMsg>,
    pub to_surface: Vec<SurfaceCommand>,
}

/// Page-side state for one running page.
pub struct PageSession {
    store: Arc<ConfigStore>,
    origin_policy: OriginPolicy,
    controller: EditModeController,
    index: AddressIndex,
    mounted: bool,
}

impl PageSession {
    pub fn new(store: Arc<ConfigStore>, origin_policy: OriginPolicy) -> Self {
        Self {
            store,
            origin_policy,
            controller: EditModeController::new(),
            index: AddressIndex::new(),
            mounted: true,
        }
    }

    /// `false` once the session has been torn down.
    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    pub fn controller(&self) -> &EditModeController {
        &self.controller
    }

    pub fn index(&self) -> &AddressIndex {
        &self.index
    }

    pub fn store(&self) -> &Arc<ConfigStore> {
        &self.store
    }

    /// Tears the session down.  Every later event, including a late
    /// template override, is discarded.
    pub fn teardown(&mut self) {
        if self.mounted {
            info!("page session torn down");
        }
        self.mounted = false;
    }

    /// Handles one event and returns the messages it produced.
    pub fn handle(&mut self, event: PageEvent) -> SessionOutput {
        let mut out = SessionOutput::default();
        if !self.mounted {
            debug!("session torn down; discarding {event:?}");
            return out;
        }

        match event {
            PageEvent::HostFrame {
                connection,
                origin,
                text,
            } => self.on_host_frame(&connection.to_string(), origin.as_deref(), &text, &mut out),
            PageEvent::Surface(event) => self.on_surface(event, &mut out),
            PageEvent::OverrideResolved {
                document,
                base_revision,
            } => self.on_override(&document, base_revision),
            PageEvent::Shutdown => self.teardown(),
        }
        out
    }

    /// Drains `events` until shutdown or until every sender is gone.
    pub async fn run(mut self, mut events: mpsc::Receiver<PageEvent>, sink: Arc<dyn OutboundSink>) {
        while let Some(event) = events.recv().await {
            let out = self.handle(event);
            for msg in &out.to_hosts {
                sink.send_to_hosts(msg);
            }
            for cmd in &out.to_surface {
                sink.send_to_surface(cmd);
            }
            if !self.mounted {
                break;
            }
        }
        self.teardown();
        debug!("page event loop stopped");
    }

    // ── Host frames ───────────────────────────────────────────────────────────

    fn on_host_frame(
        &mut self,
        connection: &str,
        origin: Option<&str>,
        text: &str,
        out: &mut SessionOutput,
    ) {
        if !self.origin_policy.permits(origin) {
            warn!(
                "host {connection}: dropping frame from disallowed origin {}",
                origin.unwrap_or("<none>")
            );
            return;
        }

        let msg = match decode_host_message(text) {
            Ok(msg) => msg,
            Err(e) => {
                warn!("host {connection}: dropping frame: {e}");
                return;
            }
        };
        debug!("host {connection} → page: {}", msg.type_name());

        match msg {
            HostToPageMsg::ConfigReplace(document) => {
                self.store.replace_document(document);
            }
            HostToPageMsg::ModeSet(mode) => self.on_mode_set(mode, out),
        }
    }

    fn on_mode_set(&mut self, mode: RequestedMode, out: &mut SessionOutput) {
        let enabled = self.controller.apply(mode).is_enabled();
        out.to_surface.push(SurfaceCommand::EditMode { enabled });
        if !enabled {
            if let Some(previous) = self.index.clear_selection() {
                out.to_surface.push(SurfaceCommand::Selection {
                    selected: None,
                    previous: Some(previous),
                    attributes: Vec::new(),
                });
            }
        }
    }

    // ── Surface events ────────────────────────────────────────────────────────

    fn on_surface(&mut self, event: SurfaceEvent, out: &mut SessionOutput) {
        match event {
            SurfaceEvent::Mount { embedded } => {
                if self.controller.mount(EmbeddingContext::from_embedded(embedded)) {
                    out.to_hosts.push(PageToHostMsg::ReadySignal);
                }
                out.to_surface.push(SurfaceCommand::EditMode {
                    enabled: self.controller.is_enabled(),
                });
            }
            SurfaceEvent::NodeCreated {
                id,
                parent,
                path,
                kind,
            } => {
                let address =
                    path.map(|path| Address::new(path, kind.unwrap_or(NodeKind::Container)));
                if let Err(e) = self.index.insert(id, parent, address) {
                    warn!("ignoring node-created for {id}: {e}");
                }
            }
            SurfaceEvent::NodeRemoved { id } => {
                let previous = self.index.selected();
                let removed = self.index.remove(id);
                debug!("node {id} removed ({removed} nodes)");
                if previous.is_some() && self.index.selected().is_none() {
                    out.to_surface.push(SurfaceCommand::Selection {
                        selected: None,
                        previous,
                        attributes: Vec::new(),
                    });
                }
            }
            SurfaceEvent::Geometry { id, rect } => {
                if !self.index.set_geometry(id, rect) {
                    debug!("geometry for unknown node {id}");
                }
            }
            SurfaceEvent::PointerDown { target, scroll } => {
                let previous = self.index.selected();
                match self
                    .index
                    .handle_pointer_down(target, self.controller.mode(), scroll)
                {
                    PointerOutcome::Intercepted(report) => {
                        let selected = self.index.selected();
                        let attributes = selected
                            .map(|id| self.index.attributes(id))
                            .unwrap_or_default()
                            .into_iter()
                            .map(|(name, value)| (name.to_string(), value))
                            .collect();
                        out.to_surface.push(SurfaceCommand::PointerHandled {
                            target,
                            intercepted: true,
                        });
                        out.to_surface.push(SurfaceCommand::Selection {
                            selected,
                            previous: previous.filter(|p| Some(*p) != selected),
                            attributes,
                        });
                        out.to_hosts.push(PageToHostMsg::SelectionReport(report));
                    }
                    PointerOutcome::PassThrough => {
                        out.to_surface.push(SurfaceCommand::PointerHandled {
                            target,
                            intercepted: false,
                        });
                    }
                }
            }
            SurfaceEvent::Unmount => {
                info!("render surface unmounted; resetting page state");
                self.controller = EditModeController::new();
                self.index = AddressIndex::new();
            }
        }
    }

    // ── Startup override ──────────────────────────────────────────────────────

    fn on_override(&mut self, document: &Document, base_revision: u64) {
        let revision = self.store.revision();
        if revision != base_revision {
            debug!(
                "store moved from revision {base_revision} to {revision}; \
                 discarding startup template"
            );
            return;
        }
        let outcome = self.store.initialize(document.clone());
        debug!("startup document applied: {outcome:?}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sitesync_core::{NodeId, Rect, ScrollOffset};

    use crate::domain::events::ConnectionId;

    fn session() -> PageSession {
        let store = Arc::new(ConfigStore::new(
            Document::from_value(json!({"meta": {"siteName": "Base"}})).unwrap(),
        ));
        PageSession::new(store, OriginPolicy::AllowAny)
    }

    fn host(text: &str) -> PageEvent {
        PageEvent::HostFrame {
            connection: ConnectionId::new(),
            origin: Some("https://editor.example".into()),
            text: text.into(),
        }
    }

    fn created(id: u64, parent: Option<u64>, path: Option<&str>) -> PageEvent {
        PageEvent::Surface(SurfaceEvent::NodeCreated {
            id: NodeId(id),
            parent: parent.map(NodeId),
            path: path.map(|p| p.parse().unwrap()),
            kind: path.map(|_| NodeKind::Text),
        })
    }

    fn override_resolved(value: serde_json::Value, base_revision: u64) -> PageEvent {
        PageEvent::OverrideResolved {
            document: Arc::new(Document::from_value(value).unwrap()),
            base_revision,
        }
    }

    fn click(id: u64) -> PageEvent {
        PageEvent::Surface(SurfaceEvent::PointerDown {
            target: NodeId(id),
            scroll: ScrollOffset::default(),
        })
    }

    #[test]
    fn test_embedded_mount_emits_ready_signal_once() {
        let mut session = session();

        let first = session.handle(PageEvent::Surface(SurfaceEvent::Mount { embedded: true }));
        let second = session.handle(PageEvent::Surface(SurfaceEvent::Mount { embedded: true }));

        assert_eq!(first.to_hosts, vec![PageToHostMsg::ReadySignal]);
        assert!(second.to_hosts.is_empty());
        assert!(session.controller().is_enabled());
    }

    #[test]
    fn test_top_level_mount_is_silent_and_clicks_pass_through() {
        let mut session = session();
        session.handle(PageEvent::Surface(SurfaceEvent::Mount { embedded: false }));
        session.handle(created(1, None, Some("sections.hero.headline")));

        let out = session.handle(click(1));

        assert!(out.to_hosts.is_empty());
        assert_eq!(
            out.to_surface,
            vec![SurfaceCommand::PointerHandled {
                target: NodeId(1),
                intercepted: false
            }]
        );
    }

    #[test]
    fn test_click_in_edit_mode_reports_selection() {
        // Arrange
        let mut session = session();
        session.handle(PageEvent::Surface(SurfaceEvent::Mount { embedded: true }));
        session.handle(created(1, None, Some("sections.hero")));
        session.handle(created(2, Some(1), None));
        session.handle(PageEvent::Surface(SurfaceEvent::Geometry {
            id: NodeId(1),
            rect: Rect::new(0.0, 0.0, 800.0, 400.0),
        }));

        // Act
        let out = session.handle(click(2));

        // Assert
        match out.to_hosts.as_slice() {
            [PageToHostMsg::SelectionReport(report)] => {
                assert_eq!(report.path.to_string(), "sections.hero");
                assert_eq!(report.rect.bottom, 400.0);
            }
            other => panic!("unexpected host output {other:?}"),
        }
        assert!(out.to_surface.contains(&SurfaceCommand::PointerHandled {
            target: NodeId(2),
            intercepted: true
        }));
        assert!(session.index().is_selected(NodeId(1)));
    }

    #[test]
    fn test_config_replace_updates_store_and_invalid_payload_is_dropped() {
        let mut session = session();

        session.handle(host(r##"{"type":"config-replace","payload":{"theme":{"primary":"#fff"}}}"##));
        session.handle(host(r#"{"type":"config-replace","payload":{}}"#));
        session.handle(host("garbage"));

        let current = session.store().current();
        assert_eq!(current.as_map()["theme"]["primary"], "#fff");
        assert_eq!(session.store().revision(), 1);
    }

    #[test]
    fn test_disallowed_origin_is_dropped() {
        let store = Arc::new(ConfigStore::new(
            Document::from_value(json!({"a": 1})).unwrap(),
        ));
        let mut session = PageSession::new(
            Arc::clone(&store),
            OriginPolicy::from_origins(vec!["https://trusted.example".into()]),
        );

        session.handle(host(r#"{"type":"config-replace","payload":{"b":2}}"#));

        assert_eq!(store.revision(), 0);
    }

    #[test]
    fn test_mode_set_view_clears_selection() {
        let mut session = session();
        session.handle(PageEvent::Surface(SurfaceEvent::Mount { embedded: true }));
        session.handle(created(1, None, Some("sections.faq.title")));
        session.handle(click(1));

        let out = session.handle(host(r#"{"type":"mode-set","payload":{"mode":"view"}}"#));

        assert_eq!(out.to_surface[0], SurfaceCommand::EditMode { enabled: false });
        assert_eq!(session.index().selected(), None);
        assert!(session.handle(click(1)).to_hosts.is_empty());
    }

    #[test]
    fn test_removing_selected_node_clears_marker() {
        let mut session = session();
        session.handle(PageEvent::Surface(SurfaceEvent::Mount { embedded: true }));
        session.handle(created(1, None, Some("sections.hero.headline")));
        session.handle(click(1));

        let out = session.handle(PageEvent::Surface(SurfaceEvent::NodeRemoved { id: NodeId(1) }));

        assert_eq!(
            out.to_surface,
            vec![SurfaceCommand::Selection {
                selected: None,
                previous: Some(NodeId(1)),
                attributes: Vec::new(),
            }]
        );
    }

    #[test]
    fn test_late_override_after_teardown_is_discarded() {
        let mut session = session();
        let store = Arc::clone(session.store());
        session.handle(PageEvent::Shutdown);

        session.handle(override_resolved(json!({"theme": {"primary": "#123"}}), 0));

        assert!(!session.is_mounted());
        assert_eq!(store.revision(), 0);
    }

    #[test]
    fn test_override_on_untouched_base_is_applied() {
        let mut session = session();

        session.handle(override_resolved(json!({"meta": {"siteName": "Template"}}), 0));

        assert_eq!(session.store().revision(), 1);
        assert_eq!(
            session.store().current().as_map()["meta"]["siteName"],
            "Template"
        );
    }

    #[test]
    fn test_late_override_does_not_clobber_host_document() {
        // Arrange: the host replaces the document before the template arrives
        let mut session = session();
        session.handle(PageEvent::Surface(SurfaceEvent::Mount { embedded: true }));
        session.handle(host(
            r#"{"type":"config-replace","payload":{"meta":{"siteName":"HostEdit"}}}"#,
        ));

        // Act: the override resolved against revision 0 shows up afterwards
        session.handle(override_resolved(
            json!({"meta": {"siteName": "TemplateOverride"}}),
            0,
        ));

        // Assert
        assert_eq!(session.store().revision(), 1);
        assert_eq!(
            session.store().current().as_map()["meta"]["siteName"],
            "HostEdit"
        );
    }

    #[test]
    fn test_unmount_resets_page_state() {
        let mut session = session();
        session.handle(PageEvent::Surface(SurfaceEvent::Mount { embedded: true }));
        session.handle(created(1, None, Some("sections.hero")));

        session.handle(PageEvent::Surface(SurfaceEvent::Unmount));
        let remount = session.handle(PageEvent::Surface(SurfaceEvent::Mount { embedded: true }));

        assert!(session.index().is_empty());
        assert_eq!(remount.to_hosts, vec![PageToHostMsg::ReadySignal]);
    }

    #[tokio::test]
    async fn test_run_forwards_output_and_stops_on_shutdown() {
        use std::sync::Mutex;

        #[derive(Default)]
        struct RecordingSink {
            hosts: Mutex<Vec<PageToHostMsg>>,
            surface: Mutex<Vec<SurfaceCommand>>,
        }

        impl OutboundSink for RecordingSink {
            fn send_to_hosts(&self, msg: &PageToHostMsg) {
                self.hosts.lock().unwrap().push(msg.clone());
            }
            fn send_to_surface(&self, cmd: &SurfaceCommand) {
                self.surface.lock().unwrap().push(cmd.clone());
            }
        }

        let sink = Arc::new(RecordingSink::default());
        let (tx, rx) = mpsc::channel(8);
        tx.send(PageEvent::Surface(SurfaceEvent::Mount { embedded: true }))
            .await
            .unwrap();
        tx.send(PageEvent::Shutdown).await.unwrap();

        session().run(rx, sink.clone()).await;

        assert_eq!(*sink.hosts.lock().unwrap(), vec![PageToHostMsg::ReadySignal]);
        assert_eq!(
            *sink.surface.lock().unwrap(),
            vec![SurfaceCommand::EditMode { enabled: true }]
        );
    }
}
