//! Template resolution use case.
//!
//! Picks the template for this run, fetches its override document and merges
//! it onto the built-in base.  The steps:
//!
//! 1. Gather candidates: the request parameter, the persisted preference and
//!    the environment default.  Each is sanitized; invalid ones are skipped.
//! 2. If the request parameter won, persist it so later runs without a
//!    parameter keep the choice.
//! 3. `default` means "base as-is": no fetch.
//! 4. Otherwise fetch `templates/<id>.json`.  Any failure (missing, bad
//!    JSON, not an object, transport error) falls back to the base document.
//!    Lower-priority candidates are not tried after a failure.
//!
//! Nothing in here returns an error to the caller: every failure degrades to
//! the base document and is logged.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

#[cfg(test)]
use mockall::automock;

use sitesync_core::document::json_kind;
use sitesync_core::{
    resolve_descriptor, Document, TemplateCandidates, TemplateDescriptor, TemplateSource,
};

// ── Error types ───────────────────────────────────────────────────────────────

/// Why an override document could not be obtained.
#[derive(Debug, Error)]
pub enum FetchError {
    /// No override exists at the location.
    #[error("template override '{0}' not found")]
    NotFound(String),

    /// Reading the override failed.
    #[error("I/O error reading '{location}': {reason}")]
    Io { location: String, reason: String },

    /// The server answered with a non-success status.
    #[error("'{location}' returned HTTP status {status}")]
    Status { location: String, status: u16 },

    /// The request could not be made or completed.
    #[error("request for '{location}' failed: {reason}")]
    Transport { location: String, reason: String },

    /// The body was not valid JSON.
    #[error("'{location}' is not valid JSON: {reason}")]
    InvalidJson { location: String, reason: String },

    /// The body was JSON but not an object.
    #[error("'{location}' must contain an object, got {kind}")]
    NotAnObject { location: String, kind: &'static str },
}

/// Failure reading or writing the persisted template preference.
#[derive(Debug, Error)]
pub enum PreferenceError {
    #[error("no location available for persisted preferences")]
    Unavailable,

    #[error("I/O error accessing preferences: {0}")]
    Io(String),

    #[error("preferences file is malformed: {0}")]
    Format(String),
}

// ── Ports ─────────────────────────────────────────────────────────────────────

/// Source of template override documents.
///
/// `location` is relative to the fetcher's root, e.g.
/// `templates/acme-dark.json`.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait TemplateFetcher: Send + Sync {
    async fn fetch(&self, location: &str) -> Result<Value, FetchError>;
}

/// Storage for the template choice that outlives a single run.
#[cfg_attr(test, automock)]
pub trait PreferenceStore: Send + Sync {
    fn load_template(&self) -> Result<Option<String>, PreferenceError>;
    fn save_template(&self, template: &TemplateDescriptor) -> Result<(), PreferenceError>;
}

// ── Use case ──────────────────────────────────────────────────────────────────

/// The outcome of a resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub descriptor: TemplateDescriptor,
    pub source: TemplateSource,
    /// The base with the override merged on, or the base alone.
    pub document: Document,
    /// `true` when an override was fetched and merged.
    pub applied_override: bool,
}

/// Resolves the startup document from a template choice.
pub struct TemplateResolver {
    fetcher: Arc<dyn TemplateFetcher>,
    preferences: Arc<dyn PreferenceStore>,
    environment_default: Option<String>,
}

impl TemplateResolver {
    pub fn new(
        fetcher: Arc<dyn TemplateFetcher>,
        preferences: Arc<dyn PreferenceStore>,
        environment_default: Option<String>,
    ) -> Self {
        Self {
            fetcher,
            preferences,
            environment_default,
        }
    }

    /// Collects the raw candidates for this run.
    pub fn candidates(&self, request_parameter: Option<&str>) -> TemplateCandidates {
        let persisted_preference = match self.preferences.load_template() {
            Ok(value) => value,
            Err(e) => {
                warn!("could not read persisted template preference: {e}");
                None
            }
        };
        TemplateCandidates {
            request_parameter: request_parameter.map(str::to_string),
            persisted_preference,
            environment_default: self.environment_default.clone(),
        }
    }

    /// Resolves the template and produces the startup document from `base`.
    pub async fn resolve(&self, base: &Document, request_parameter: Option<&str>) -> Resolution {
        let candidates = self.candidates(request_parameter);
        let (descriptor, source) = resolve_descriptor(&candidates);

        if source == TemplateSource::RequestParameter {
            if let Err(e) = self.preferences.save_template(&descriptor) {
                warn!("could not persist template preference '{descriptor}': {e}");
            }
        }

        if descriptor.is_builtin() {
            debug!("template '{descriptor}' uses the base document");
            return Resolution {
                descriptor,
                source,
                document: base.clone(),
                applied_override: false,
            };
        }

        match self.fetch_override(&descriptor).await {
            Ok(overlay) => {
                info!("applied template override '{descriptor}' (from {source:?})");
                Resolution {
                    document: base.with_override(&overlay),
                    descriptor,
                    source,
                    applied_override: true,
                }
            }
            Err(e) => {
                warn!("template override '{descriptor}' unavailable, using base: {e}");
                Resolution {
                    descriptor,
                    source,
                    document: base.clone(),
                    applied_override: false,
                }
            }
        }
    }

    async fn fetch_override(&self, descriptor: &TemplateDescriptor) -> Result<Document, FetchError> {
        let location = descriptor.override_location();
        let value = self.fetcher.fetch(&location).await?;
        let kind = json_kind(&value);
        Document::from_value(value).map_err(|_| FetchError::NotAnObject { location, kind })
    }
}
