//! Wiring for a running page.
//!
//! Startup is two-phase:
//!
//! 1. **Synchronous.**  The store is created from the built-in base document
//!    and seeded with the blog posts, so the page can render immediately.
//! 2. **Asynchronous.**  The template resolver runs in its own task.  When it
//!    produces an override document, the result is queued to the page event
//!    loop as [`PageEvent::OverrideResolved`] and supersedes the base through
//!    a second whole-document write.  If the page is already torn down by
//!    then, or the store has moved past the base (a host already sent its
//!    own document), the result is discarded.

use std::net::SocketAddr;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use sitesync_core::domain::posts::POSTS_SEED_PATH;
use sitesync_core::{builtin_base, ConfigPath, PostCollection};

use crate::application::resolver::{PreferenceStore, TemplateFetcher, TemplateResolver};
use crate::application::session::PageSession;
use crate::application::store::ConfigStore;
use crate::domain::config::{RuntimeConfig, TemplateSourceConfig};
use crate::domain::events::PageEvent;
use crate::infrastructure::fetchers::{FsTemplateFetcher, HttpTemplateFetcher};
use crate::infrastructure::ws_server::{self, Connections, ServerContext};

/// Capacity of the page event queue.
const EVENT_QUEUE: usize = 256;

/// Builds the fetcher matching the configured template source.
pub fn fetcher_for(source: &TemplateSourceConfig) -> Arc<dyn TemplateFetcher> {
    match source {
        TemplateSourceConfig::Directory(dir) => Arc::new(FsTemplateFetcher::new(dir.clone())),
        TemplateSourceConfig::Url(url) => Arc::new(HttpTemplateFetcher::new(url)),
    }
}

/// A started page: store, event loop and connection registry.
pub struct PageRuntime {
    store: Arc<ConfigStore>,
    events: mpsc::Sender<PageEvent>,
    connections: Arc<Connections>,
    session_task: JoinHandle<()>,
    forwarder_task: JoinHandle<()>,
    resolver_task: JoinHandle<()>,
}

impl PageRuntime {
    /// Starts the page: phase one runs before this returns, phase two is
    /// spawned.
    pub fn start(
        config: &RuntimeConfig,
        fetcher: Arc<dyn TemplateFetcher>,
        preferences: Arc<dyn PreferenceStore>,
        posts: PostCollection,
    ) -> Self {
        // ── Phase 1: base document + seeds ───────────────────────────────────
        let base = builtin_base();
        let store = Arc::new(ConfigStore::new(base.clone()));
        seed_posts(&store, &posts);
        let base_revision = store.revision();

        let connections = Arc::new(Connections::new(config.target_origin.clone()));
        let forwarder_task =
            ws_server::spawn_render_forwarder(Arc::clone(&store), Arc::clone(&connections));

        let (events, rx) = mpsc::channel(EVENT_QUEUE);
        let session = PageSession::new(Arc::clone(&store), config.origin_policy.clone());
        let sink = Arc::clone(&connections);
        let session_task = tokio::spawn(async move { session.run(rx, sink).await });

        // ── Phase 2: template override ───────────────────────────────────────
        let resolver = TemplateResolver::new(fetcher, preferences, config.default_template.clone());
        let request = config.request_template.clone();
        let queue = events.clone();
        let resolver_task = tokio::spawn(async move {
            let resolution = resolver.resolve(&base, request.as_deref()).await;
            info!(
                "template '{}' resolved (source {:?}, override applied: {})",
                resolution.descriptor, resolution.source, resolution.applied_override
            );
            if !resolution.applied_override {
                return;
            }
            let event = PageEvent::OverrideResolved {
                document: Arc::new(resolution.document),
                base_revision,
            };
            if queue.send(event).await.is_err() {
                debug!("page already stopped; discarding resolved template");
            }
        });

        Self {
            store,
            events,
            connections,
            session_task,
            forwarder_task,
            resolver_task,
        }
    }

    pub fn store(&self) -> &Arc<ConfigStore> {
        &self.store
    }

    pub fn connections(&self) -> &Arc<Connections> {
        &self.connections
    }

    /// Sender for the page event queue.
    pub fn events(&self) -> mpsc::Sender<PageEvent> {
        self.events.clone()
    }

    fn server_context(&self) -> Arc<ServerContext> {
        Arc::new(ServerContext {
            store: Arc::clone(&self.store),
            events: self.events.clone(),
            connections: Arc::clone(&self.connections),
        })
    }

    /// Binds `bind_addr` and serves until `running` is cleared.
    ///
    /// # Errors
    ///
    /// Returns an error if the listener cannot be bound.
    pub async fn run_server(
        &self,
        bind_addr: SocketAddr,
        running: Arc<AtomicBool>,
    ) -> anyhow::Result<()> {
        ws_server::run_server(bind_addr, self.server_context(), running).await
    }

    /// Serves on an already-bound listener until `running` is cleared.
    pub async fn serve(&self, listener: TcpListener, running: Arc<AtomicBool>) {
        ws_server::serve(listener, self.server_context(), running).await;
    }

    /// Stops the event loop and background tasks.
    pub async fn shutdown(self) {
        if self.events.send(PageEvent::Shutdown).await.is_err() {
            debug!("page event loop already stopped");
        }
        if let Err(e) = self.session_task.await {
            warn!("page event loop ended abnormally: {e}");
        }
        self.resolver_task.abort();
        self.forwarder_task.abort();
    }
}

fn seed_posts(store: &ConfigStore, posts: &PostCollection) {
    let path = match POSTS_SEED_PATH.parse::<ConfigPath>() {
        Ok(path) => path,
        Err(e) => {
            warn!("invalid posts seed path: {e}");
            return;
        }
    };
    match store.seed(&path, posts.to_value()) {
        Ok(_) => debug!("seeded {} posts at '{path}'", posts.len()),
        Err(e) => warn!("could not seed posts at '{path}': {e}"),
    }
}
