//! Domain layer for sitesync-page.
//!
//! The domain layer contains plain types with no I/O: the runtime
//! configuration and the messages exchanged with the render surface.  The
//! host-facing messages live in `sitesync-core` because hosts written in Rust
//! share them.
//!
//! # What does NOT belong here?
//!
//! - Any `tokio`, `TcpStream`, or `WebSocket` types
//! - File I/O or environment variable reading

pub mod config;
pub mod events;

// Re-export the most commonly needed types at the domain module boundary
// so callers can write `domain::RuntimeConfig` instead of the longer path.
pub use config::{RuntimeConfig, RuntimeConfigError, RuntimeFile, TemplateSourceConfig};
pub use events::{ConnectionId, PageEvent, SurfaceCommand, SurfaceEvent};
