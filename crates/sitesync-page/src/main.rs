//! Sitesync page runtime entry point.
//!
//! This binary runs one live-editable page.  It renders from a configuration
//! document, lets a hosting editor replace that document and toggle edit
//! mode, and reports the configuration path of every element clicked in
//! edit mode.
//!
//! # Usage
//!
//! ```text
//! sitesync-page [OPTIONS]
//!
//! Options:
//!   --config <FILE>             Runtime TOML file
//!   --bind <IP>                 Bind address [default: 127.0.0.1]
//!   --port <PORT>               WebSocket port [default: 4710]
//!   --templates-dir <DIR>       Directory containing templates/<id>.json
//!   --templates-url <URL>       Base URL serving templates/<id>.json
//!   --template <ID>             Template requested for this run
//!   --default-template <ID>     Environment default template
//!   --posts-file <FILE>         Blog posts JSON array
//!   --allow-origin <ORIGIN>     Accept host frames only from this origin (repeatable)
//!   --target-origin <ORIGIN>    Send page messages only to this origin [default: *]
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable                  | Flag                 |
//! |---------------------------|----------------------|
//! | `SITESYNC_CONFIG`         | `--config`           |
//! | `SITESYNC_BIND`           | `--bind`             |
//! | `SITESYNC_PORT`           | `--port`             |
//! | `SITESYNC_TEMPLATES_DIR`  | `--templates-dir`    |
//! | `SITESYNC_TEMPLATES_URL`  | `--templates-url`    |
//! | `SITESYNC_TEMPLATE`       | `--default-template` |
//! | `SITESYNC_POSTS_FILE`     | `--posts-file`       |
//!
//! Flags win over the runtime file, which wins over built-in defaults.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use sitesync_core::protocol::{OriginPolicy, TargetOrigin};
use sitesync_core::PostCollection;
use sitesync_page::domain::{RuntimeConfig, RuntimeFile, TemplateSourceConfig};
use sitesync_page::infrastructure::{fetcher_for, load_posts, PageRuntime, TomlPreferenceStore};

// ── CLI argument definitions ──────────────────────────────────────────────────

/// Sitesync live-editing page runtime.
#[derive(Debug, Parser)]
#[command(
    name = "sitesync-page",
    about = "Config-driven page runtime with live editing over WebSocket",
    version
)]
struct Cli {
    /// Runtime configuration file (TOML).
    #[arg(long, env = "SITESYNC_CONFIG")]
    config: Option<PathBuf>,

    /// IP address to bind the WebSocket server to.
    #[arg(long, env = "SITESYNC_BIND")]
    bind: Option<String>,

    /// TCP port for the WebSocket server.
    #[arg(long, env = "SITESYNC_PORT")]
    port: Option<u16>,

    /// Directory that contains the `templates/` folder.
    #[arg(long, env = "SITESYNC_TEMPLATES_DIR", conflicts_with = "templates_url")]
    templates_dir: Option<PathBuf>,

    /// Base URL that serves `templates/<id>.json`.
    #[arg(long, env = "SITESYNC_TEMPLATES_URL")]
    templates_url: Option<String>,

    /// Template requested for this run.  A valid value is remembered for
    /// later runs.
    #[arg(long)]
    template: Option<String>,

    /// Template used when none is requested or remembered.
    #[arg(long, env = "SITESYNC_TEMPLATE")]
    default_template: Option<String>,

    /// JSON array of blog posts.
    #[arg(long, env = "SITESYNC_POSTS_FILE")]
    posts_file: Option<PathBuf>,

    /// Accept host frames only from this origin.  Repeat for several origins.
    /// Without any, every origin is accepted.
    #[arg(long = "allow-origin")]
    allow_origins: Vec<String>,

    /// Send page messages only to hosts with this origin (`*` for any).
    #[arg(long)]
    target_origin: Option<String>,
}

impl Cli {
    /// Builds the [`RuntimeConfig`]: defaults, then the `--config` file, then
    /// flags.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed, or if
    /// the bind address is not an IP address.
    fn into_runtime_config(self) -> anyhow::Result<RuntimeConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read config file {}", path.display()))?;
                RuntimeFile::from_toml_str(&text)
                    .and_then(RuntimeFile::into_runtime_config)
                    .with_context(|| format!("invalid config file {}", path.display()))?
            }
            None => RuntimeConfig::default(),
        };

        if let Some(bind) = &self.bind {
            let ip: IpAddr = bind
                .parse()
                .with_context(|| format!("invalid bind address: '{bind}'"))?;
            config.bind_addr = SocketAddr::new(ip, config.bind_addr.port());
        }
        if let Some(port) = self.port {
            config.bind_addr.set_port(port);
        }
        if let Some(url) = self.templates_url {
            config.template_source = TemplateSourceConfig::Url(url);
        } else if let Some(dir) = self.templates_dir {
            config.template_source = TemplateSourceConfig::Directory(dir);
        }
        if self.template.is_some() {
            config.request_template = self.template;
        }
        if self.default_template.is_some() {
            config.default_template = self.default_template;
        }
        if let Some(posts_file) = self.posts_file {
            config.posts_file = posts_file;
        }
        if !self.allow_origins.is_empty() {
            config.origin_policy = OriginPolicy::from_origins(self.allow_origins);
        }
        if let Some(target) = &self.target_origin {
            config.target_origin = TargetOrigin::parse(target);
        }
        Ok(config)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

/// Program entry point.
///
/// # What happens at startup
///
/// 1. CLI arguments are parsed and merged with the runtime file.
/// 2. `tracing_subscriber` is initialised; `RUST_LOG` wins over the
///    configured level.
/// 3. Blog posts are loaded (a missing file means no posts).
/// 4. The page runtime starts: the base document is available at once and
///    the template override is resolved in the background.
/// 5. A Ctrl+C handler clears the shared `running` flag, which stops the
///    accept loop.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.into_runtime_config()?;

    // ── Logging setup ─────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str())),
        )
        .init();

    info!(
        "sitesync page runtime starting: ws={}, templates={:?}",
        config.bind_addr, config.template_source
    );

    let posts = match load_posts(&config.posts_file) {
        Ok(posts) => posts,
        Err(e) => {
            warn!("{e}; starting with no posts");
            PostCollection::default()
        }
    };

    let preferences = TomlPreferenceStore::platform_default();
    match preferences.path() {
        Some(path) => info!("template preference file: {}", path.display()),
        None => warn!("no platform config directory; template choice will not be remembered"),
    }

    let runtime = PageRuntime::start(
        &config,
        fetcher_for(&config.template_source),
        Arc::new(preferences),
        posts,
    );

    // ── Graceful shutdown flag ─────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C, initiating graceful shutdown");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    // ── Main server loop ───────────────────────────────────────────────────────
    let served = runtime.run_server(config.bind_addr, running).await;
    runtime.shutdown().await;
    served?;

    info!("sitesync page runtime stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
