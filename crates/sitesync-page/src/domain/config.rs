//! Runtime configuration types.
//!
//! [`RuntimeConfig`] is the single source of truth for all runtime settings.
//! It is built once at startup from three layers, later layers winning:
//!
//! 1. Built-in defaults ([`RuntimeConfig::default`]).
//! 2. An optional TOML file (`--config`), parsed into [`RuntimeFile`].
//! 3. Command-line flags and their environment variables (see `main.rs`).
//!
//! The domain layer only parses text; reading the file from disk happens in
//! `main.rs`.
//!
//! # File format
//!
//! Every table and every key is optional:
//!
//! ```toml
//! [server]
//! bind = "127.0.0.1"
//! port = 4710
//!
//! [templates]
//! dir = "public"            # override files live in <dir>/templates/<id>.json
//! # url = "https://cdn.example.com"   # fetch over HTTP instead
//! default = "acme-dark"     # environment default template
//!
//! [content]
//! posts_file = "content/posts/posts.json"
//!
//! [channel]
//! allowed_origins = ["https://editor.example.com"]
//! target_origin = "*"
//!
//! [logging]
//! level = "info"
//! ```

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use sitesync_core::protocol::{OriginPolicy, TargetOrigin};

/// Default WebSocket port for the host and surface channels.
pub const DEFAULT_PORT: u16 = 4710;
/// Default directory that contains the `templates/` folder.
pub const DEFAULT_TEMPLATES_DIR: &str = "public";
/// Default location of the blog post list.
pub const DEFAULT_POSTS_FILE: &str = "content/posts/posts.json";

/// Errors raised while parsing the runtime configuration file.
#[derive(Debug, Error)]
pub enum RuntimeConfigError {
    #[error("failed to parse runtime config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid bind address '{0}'")]
    InvalidBindAddress(String),
}

/// Where template override documents are fetched from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateSourceConfig {
    /// A directory on disk containing `templates/<id>.json`.
    Directory(PathBuf),
    /// A base URL; overrides are fetched from `<url>/templates/<id>.json`.
    Url(String),
}

/// All runtime configuration for the page runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeConfig {
    /// Address the WebSocket server binds to.
    pub bind_addr: SocketAddr,
    /// Where template overrides come from.
    pub template_source: TemplateSourceConfig,
    /// Template requested for this run (the request parameter).
    pub request_template: Option<String>,
    /// Environment default template.
    pub default_template: Option<String>,
    /// JSON array of blog posts seeded into the document.
    pub posts_file: PathBuf,
    /// Which host origins may send messages to the page.
    pub origin_policy: OriginPolicy,
    /// Which host origins receive the page's messages.
    pub target_origin: TargetOrigin,
    /// Fallback log filter when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for RuntimeConfig {
    /// | Field            | Default                     |
    /// |------------------|-----------------------------|
    /// | bind_addr        | `127.0.0.1:4710`            |
    /// | template_source  | directory `public`          |
    /// | posts_file       | `content/posts/posts.json`  |
    /// | origin_policy    | allow any                   |
    /// | target_origin    | `*`                         |
    /// | log_level        | `info`                      |
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), DEFAULT_PORT),
            template_source: TemplateSourceConfig::Directory(PathBuf::from(DEFAULT_TEMPLATES_DIR)),
            request_template: None,
            default_template: None,
            posts_file: PathBuf::from(DEFAULT_POSTS_FILE),
            origin_policy: OriginPolicy::AllowAny,
            target_origin: TargetOrigin::Any,
            log_level: "info".to_string(),
        }
    }
}

// ── File representation ───────────────────────────────────────────────────────

/// Parsed contents of the runtime TOML file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeFile {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub templates: TemplatesSection,
    #[serde(default)]
    pub content: ContentSection,
    #[serde(default)]
    pub channel: ChannelSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TemplatesSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentSection {
    #[serde(default = "default_posts_file")]
    pub posts_file: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSection {
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    #[serde(default = "default_target_origin")]
    pub target_origin: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_posts_file() -> PathBuf {
    PathBuf::from(DEFAULT_POSTS_FILE)
}
fn default_target_origin() -> String {
    "*".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

impl Default for ContentSection {
    fn default() -> Self {
        Self {
            posts_file: default_posts_file(),
        }
    }
}

impl Default for ChannelSection {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(),
            target_origin: default_target_origin(),
        }
    }
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl RuntimeFile {
    /// Parses the TOML text of a runtime file.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeConfigError::Parse`] for malformed TOML or mistyped
    /// values.
    pub fn from_toml_str(text: &str) -> Result<Self, RuntimeConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Resolves the file into a [`RuntimeConfig`].
    ///
    /// A template URL takes precedence over a template directory.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeConfigError::InvalidBindAddress`] if `server.bind` is
    /// not an IP address.
    pub fn into_runtime_config(self) -> Result<RuntimeConfig, RuntimeConfigError> {
        let ip: IpAddr = self
            .server
            .bind
            .parse()
            .map_err(|_| RuntimeConfigError::InvalidBindAddress(self.server.bind.clone()))?;

        let template_source = match (self.templates.url, self.templates.dir) {
            (Some(url), _) => TemplateSourceConfig::Url(url),
            (None, Some(dir)) => TemplateSourceConfig::Directory(dir),
            (None, None) => TemplateSourceConfig::Directory(PathBuf::from(DEFAULT_TEMPLATES_DIR)),
        };

        Ok(RuntimeConfig {
            bind_addr: SocketAddr::new(ip, self.server.port),
            template_source,
            request_template: None,
            default_template: self.templates.default,
            posts_file: self.content.posts_file,
            origin_policy: OriginPolicy::from_origins(self.channel.allowed_origins),
            target_origin: TargetOrigin::parse(&self.channel.target_origin),
            log_level: self.logging.level,
        })
    }
}
