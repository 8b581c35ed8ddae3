//! Application layer for sitesync-page.
//!
//! The application layer orchestrates the page: it knows *what* to do, but
//! delegates *how* to do it to the infrastructure layer.
//!
//! # Responsibilities
//!
//! - Holding the current configuration document ([`store`])
//! - Picking the startup template and merging its override ([`resolver`])
//! - Reacting to host frames and render-surface events ([`session`])
//!
//! # What does NOT belong here?
//!
//! - Opening sockets or listening for connections (that is infrastructure)
//! - Reading files or making HTTP requests (the fetchers and preference
//!   storage in infrastructure implement this layer's traits)
//! - WebSocket framing (handled by tokio-tungstenite)

pub mod resolver;
pub mod session;
pub mod store;

// Re-export so callers can write `application::ConfigStore` instead of the
// full module path.
pub use resolver::{
    FetchError, PreferenceError, PreferenceStore, Resolution, TemplateFetcher, TemplateResolver,
};
pub use session::{OutboundSink, PageSession, SessionOutput};
pub use store::{ConfigStore, ReplaceOutcome, StoreEvent};
