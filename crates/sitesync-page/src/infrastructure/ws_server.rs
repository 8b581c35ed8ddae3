//! WebSocket server: accept loop, connection roles and outbound fan-out.
//!
//! This module is responsible for:
//!
//! 1. Binding a TCP listener on the configured address.
//! 2. Upgrading each connection to a WebSocket session, choosing its role from
//!    the request path:
//!    - `/host`    – a hosting editor.  Its `Origin` header is the origin of
//!      every frame it sends.
//!    - `/surface` – a render surface reporting mounts, nodes and clicks.
//! 3. Forwarding inbound frames into the page event queue.  Connection tasks
//!    never touch page state themselves.
//! 4. Fanning outbound messages out to the attached connections
//!    ([`Connections`] implements [`OutboundSink`]).
//! 5. Gracefully shutting down when the `running` flag is cleared.
//!
//! # Portability
//!
//! Uses only `tokio::net` APIs, which are portable across Windows, Linux and
//! macOS.  Shutdown is triggered by a shared `AtomicBool` set from a Ctrl+C
//! handler (see `main.rs`).

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex, MutexGuard,
};
use std::time::Duration;

use anyhow::Context;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::{
    accept_hdr_async,
    tungstenite::{
        handshake::server::{ErrorResponse, Request, Response},
        http::{header::ORIGIN, StatusCode},
        Error as WsError, Message as WsMessage,
    },
};
use tracing::{debug, error, info, warn};

use sitesync_core::protocol::{encode_page_message, PageToHostMsg, TargetOrigin};

use crate::application::session::OutboundSink;
use crate::application::store::{ConfigStore, StoreEvent};
use crate::domain::events::{ConnectionId, PageEvent, SurfaceCommand, SurfaceEvent};

/// Request path for hosting editors.
pub const HOST_PATH: &str = "/host";
/// Request path for render surfaces.
pub const SURFACE_PATH: &str = "/surface";

/// How often the accept loop re-checks the `running` flag.
const ACCEPT_POLL: Duration = Duration::from_millis(200);

// ── Connection registry ───────────────────────────────────────────────────────

/// The role a connection chose through its request path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Host,
    Surface,
}

impl Role {
    pub fn from_path(path: &str) -> Option<Self> {
        match path.trim_end_matches('/') {
            HOST_PATH => Some(Role::Host),
            SURFACE_PATH => Some(Role::Surface),
            _ => None,
        }
    }
}

struct Peer {
    origin: Option<String>,
    tx: mpsc::UnboundedSender<WsMessage>,
}

/// Attached hosts and surfaces, and the outbound target origin.
///
/// Any number of hosts may attach.  At most one render surface is attached at
/// a time: the page session keeps a single node index and edit-mode state, so
/// a second surface is refused until the first has gone.
pub struct Connections {
    target_origin: TargetOrigin,
    hosts: Mutex<HashMap<ConnectionId, Peer>>,
    surfaces: Mutex<HashMap<ConnectionId, Peer>>,
    surface_claimed: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Connections {
    pub fn new(target_origin: TargetOrigin) -> Self {
        Self {
            target_origin,
            hosts: Mutex::new(HashMap::new()),
            surfaces: Mutex::new(HashMap::new()),
            surface_claimed: AtomicBool::new(false),
        }
    }

    /// Reserves the single surface slot.  Returns `false` when another
    /// surface holds it.
    pub fn claim_surface(&self) -> bool {
        self.surface_claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Frees the surface slot taken by [`Connections::claim_surface`].
    pub fn release_surface(&self) {
        self.surface_claimed.store(false, Ordering::Release);
    }

    pub fn attach(
        &self,
        id: ConnectionId,
        role: Role,
        origin: Option<String>,
        tx: mpsc::UnboundedSender<WsMessage>,
    ) {
        let peer = Peer { origin, tx };
        match role {
            Role::Host => lock(&self.hosts).insert(id, peer),
            Role::Surface => lock(&self.surfaces).insert(id, peer),
        };
    }

    pub fn detach(&self, id: ConnectionId, role: Role) {
        match role {
            Role::Host => lock(&self.hosts).remove(&id),
            Role::Surface => lock(&self.surfaces).remove(&id),
        };
    }

    pub fn host_count(&self) -> usize {
        lock(&self.hosts).len()
    }

    pub fn surface_count(&self) -> usize {
        lock(&self.surfaces).len()
    }
}

impl OutboundSink for Connections {
    fn send_to_hosts(&self, msg: &PageToHostMsg) {
        let text = match encode_page_message(msg) {
            Ok(text) => text,
            Err(e) => {
                error!("failed to encode {}: {e}", msg.type_name());
                return;
            }
        };
        let hosts = lock(&self.hosts);
        let mut delivered = 0usize;
        for peer in hosts.values() {
            if self.target_origin.matches(peer.origin.as_deref())
                && peer.tx.send(WsMessage::Text(text.clone())).is_ok()
            {
                delivered += 1;
            }
        }
        if delivered == 0 {
            debug!("no host attached for {}; message dropped", msg.type_name());
        } else {
            debug!("page → {delivered} host(s): {}", msg.type_name());
        }
    }

    fn send_to_surface(&self, cmd: &SurfaceCommand) {
        let text = match serde_json::to_string(cmd) {
            Ok(text) => text,
            Err(e) => {
                error!("failed to encode surface command: {e}");
                return;
            }
        };
        for peer in lock(&self.surfaces).values() {
            // A closed receiver means the connection is going away; its task
            // detaches it.
            let _ = peer.tx.send(WsMessage::Text(text.clone()));
        }
    }
}

// ── Server ────────────────────────────────────────────────────────────────────

/// What every connection task needs.
pub struct ServerContext {
    pub store: Arc<ConfigStore>,
    pub events: mpsc::Sender<PageEvent>,
    pub connections: Arc<Connections>,
}

/// Binds `bind_addr` and runs [`serve`] until `running` is cleared.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot be bound (e.g., the port is
/// already in use or the process lacks permission to bind).
pub async fn run_server(
    bind_addr: SocketAddr,
    ctx: Arc<ServerContext>,
    running: Arc<AtomicBool>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind WebSocket listener on {bind_addr}"))?;
    info!("page runtime listening on ws://{bind_addr} ({HOST_PATH}, {SURFACE_PATH})");
    serve(listener, ctx, running).await;
    Ok(())
}

/// Accepts connections on an already-bound listener until `running` is
/// cleared.  Each connection runs in its own task.
pub async fn serve(listener: TcpListener, ctx: Arc<ServerContext>, running: Arc<AtomicBool>) {
    loop {
        if !running.load(Ordering::Relaxed) {
            info!("shutdown flag set; stopping accept loop");
            break;
        }

        // A short timeout lets the loop notice the flag while idle.
        match timeout(ACCEPT_POLL, listener.accept()).await {
            Ok(Ok((stream, peer_addr))) => {
                debug!("new connection from {peer_addr}");
                let ctx = Arc::clone(&ctx);
                tokio::spawn(async move {
                    handle_connection(stream, peer_addr, ctx).await;
                });
            }
            Ok(Err(e)) => {
                error!("accept error: {e}");
            }
            Err(_) => {}
        }
    }
}

/// Pushes a render command to every surface after each accepted store write.
pub fn spawn_render_forwarder(
    store: Arc<ConfigStore>,
    connections: Arc<Connections>,
) -> JoinHandle<()> {
    let mut changes = store.subscribe();
    tokio::spawn(async move {
        loop {
            match changes.recv().await {
                Ok(event) => connections.send_to_surface(&render_command(&event)),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("render forwarder skipped {skipped} revisions");
                    let event = StoreEvent {
                        revision: store.revision(),
                        document: store.current(),
                    };
                    connections.send_to_surface(&render_command(&event));
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

/// Builds the render command for a store revision.
pub fn render_command(event: &StoreEvent) -> SurfaceCommand {
    SurfaceCommand::Render {
        revision: event.revision,
        sections: event
            .document
            .section_plan()
            .into_iter()
            .map(|(name, _)| name)
            .collect(),
        document: event.document.as_ref().clone(),
    }
}

// ── Per-connection handler ────────────────────────────────────────────────────

fn reject(status: StatusCode, reason: &str) -> ErrorResponse {
    let mut response = ErrorResponse::new(Some(reason.to_string()));
    *response.status_mut() = status;
    response
}

async fn handle_connection(stream: TcpStream, peer_addr: SocketAddr, ctx: Arc<ServerContext>) {
    match run_connection(stream, peer_addr, ctx).await {
        Ok(()) => debug!("connection {peer_addr} closed normally"),
        Err(e) => warn!("connection {peer_addr} closed with error: {e:#}"),
    }
}

async fn run_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    ctx: Arc<ServerContext>,
) -> anyhow::Result<()> {
    // ── Step 1: handshake, capturing the path and Origin header ──────────────
    let mut role = None;
    let mut origin = None;
    let connections = &ctx.connections;
    let callback = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
        origin = req
            .headers()
            .get(ORIGIN)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        match Role::from_path(req.uri().path()) {
            Some(Role::Surface) if !connections.claim_surface() => {
                Err(reject(StatusCode::CONFLICT, "a render surface is already attached"))
            }
            Some(r) => {
                role = Some(r);
                Ok(resp)
            }
            None => Err(reject(
                StatusCode::NOT_FOUND,
                &format!("unknown path; use {HOST_PATH} or {SURFACE_PATH}"),
            )),
        }
    };
    let handshake = accept_hdr_async(stream, callback).await;
    let ws_stream = match handshake {
        Ok(ws_stream) => ws_stream,
        Err(e) => {
            // The slot was claimed for a surface that never attached.
            if role == Some(Role::Surface) {
                ctx.connections.release_surface();
            }
            return Err(e).with_context(|| format!("WebSocket handshake failed with {peer_addr}"));
        }
    };
    let role = role.context("handshake accepted without a role")?;

    let id = ConnectionId::new();
    info!(
        "{role:?} {id} attached from {peer_addr} (origin {})",
        origin.as_deref().unwrap_or("<none>")
    );

    // ── Step 2: register the outbound queue ───────────────────────────────────
    let (ws_tx, mut ws_rx) = ws_stream.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<WsMessage>();
    ctx.connections.attach(id, role, origin.clone(), out_tx.clone());

    if role == Role::Surface {
        // A new surface renders the current document straight away.
        let event = StoreEvent {
            revision: ctx.store.revision(),
            document: ctx.store.current(),
        };
        if let Ok(text) = serde_json::to_string(&render_command(&event)) {
            let _ = out_tx.send(WsMessage::Text(text));
        }
    }
    drop(out_tx);

    // ── Task A: outbound queue → socket ──────────────────────────────────────
    let writer_task = tokio::spawn({
        let mut ws_tx = ws_tx;
        async move {
            while let Some(msg) = out_rx.recv().await {
                if ws_tx.send(msg).await.is_err() {
                    debug!("connection {id}: send failed (peer disconnected)");
                    break;
                }
            }
        }
    });

    // ── Task B: socket → page event queue ─────────────────────────────────────
    let events = ctx.events.clone();
    let reader_task = tokio::spawn(async move {
        loop {
            let msg = match ws_rx.next().await {
                Some(Ok(msg)) => msg,
                Some(Err(WsError::ConnectionClosed | WsError::Protocol(_))) | None => {
                    debug!("connection {id}: stream closed");
                    break;
                }
                Some(Err(e)) => {
                    warn!("connection {id}: WebSocket error: {e}");
                    break;
                }
            };

            let event = match msg {
                WsMessage::Text(text) => match role {
                    Role::Host => PageEvent::HostFrame {
                        connection: id,
                        origin: origin.clone(),
                        text,
                    },
                    Role::Surface => match serde_json::from_str::<SurfaceEvent>(&text) {
                        Ok(event) => PageEvent::Surface(event),
                        Err(e) => {
                            warn!("surface {id}: invalid event: {e}");
                            continue;
                        }
                    },
                },
                WsMessage::Binary(_) => {
                    warn!("connection {id}: unexpected binary frame (ignored)");
                    continue;
                }
                WsMessage::Close(_) => {
                    debug!("connection {id}: Close frame received");
                    break;
                }
                WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_) => continue,
            };

            if events.send(event).await.is_err() {
                debug!("connection {id}: page event loop stopped");
                break;
            }
        }
    });

    // ── Step 3: wait for either side to finish ───────────────────────────────
    tokio::select! {
        _ = writer_task => debug!("connection {id}: writer ended"),
        _ = reader_task => debug!("connection {id}: reader ended"),
    }

    ctx.connections.detach(id, role);
    if role == Role::Surface {
        // A vanished surface takes the rendered page with it.  The slot is
        // freed only once the unmount is queued, so a successor's mount is
        // always processed after it.
        let _ = ctx.events.send(PageEvent::Surface(SurfaceEvent::Unmount)).await;
        ctx.connections.release_surface();
    }
    info!("{role:?} {id} detached");
    Ok(())
}
