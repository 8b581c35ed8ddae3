//! Infrastructure layer for sitesync-page.
//!
//! The infrastructure layer handles all I/O: the WebSocket server, template
//! fetches, the preferences file and the posts file.
//!
//! # Responsibilities
//!
//! - Binding a TCP listener and upgrading connections to WebSocket
//! - Routing `/host` and `/surface` connections into the page event queue
//! - Reading template overrides from disk or over HTTP
//! - Persisting the template preference
//! - Wiring everything together at startup ([`runtime`])
//!
//! # What does NOT belong here?
//!
//! - Deciding what a host frame or a click means (that is the application
//!   layer)
//! - Message type definitions (that is the domain layer and sitesync-core)

pub mod fetchers;
pub mod posts;
pub mod preferences;
pub mod runtime;
pub mod ws_server;

// Re-export the primary entry points so `main.rs` can call them concisely.
pub use fetchers::{FsTemplateFetcher, HttpTemplateFetcher};
pub use posts::{load_posts, PostsError};
pub use preferences::{platform_config_dir, TomlPreferenceStore};
pub use runtime::{fetcher_for, PageRuntime};
pub use ws_server::{run_server, serve, Connections, Role, HOST_PATH, SURFACE_PATH};
