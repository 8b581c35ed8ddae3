//! sitesync-page library crate.
//!
//! The runtime side of live site editing: it holds the current configuration
//! document, resolves the startup template, and talks to a hosting editor and
//! a render surface over WebSocket.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! Hosting editor (JSON over WebSocket, /host)
//!         ↕
//! [sitesync-page]
//!   ├── domain/           Pure types: RuntimeConfig, surface events, page events
//!   ├── application/      ConfigStore, TemplateResolver, PageSession
//!   └── infrastructure/
//!         ├── ws_server/  Accept loop, connection roles, outbound fan-out
//!         ├── fetchers/   Template overrides from disk or HTTP
//!         ├── preferences/ Persisted template choice (TOML)
//!         └── runtime/    Startup wiring
//!         ↕
//! Render surface (JSON over WebSocket, /surface)
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O and no async.
//! - `application` depends on `domain` and `sitesync-core`; its I/O needs are
//!   expressed as traits (`TemplateFetcher`, `PreferenceStore`,
//!   `OutboundSink`).
//! - `infrastructure` implements those traits with `tokio`, `tungstenite`,
//!   `reqwest` and the file system.

/// Domain layer: configuration and event types (no I/O).
pub mod domain;

/// Application layer: store, template resolution and the page session.
pub mod application;

/// Infrastructure layer: WebSocket server, fetchers and file storage.
pub mod infrastructure;
