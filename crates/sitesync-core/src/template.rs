//! Template descriptors and the order in which they are chosen.
//!
//! A template is a named override document merged onto the built-in base.
//! Its name travels through untrusted channels (a query parameter, a stored
//! preference, an environment variable) and ends up in a file name or URL, so
//! it is sanitized before it is used anywhere: only lowercase ASCII letters,
//! digits and hyphens are accepted.
//!
//! # Resolution order
//!
//! ```text
//! request parameter  >  persisted preference  >  environment default  >  "default"
//! ```
//!
//! Each candidate is checked in turn.  An invalid candidate is skipped and
//! the next source is consulted; it never aborts the resolution.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::document::BUILTIN_TEMPLATE_ID;

/// Directory, relative to the template source root, holding override files.
pub const TEMPLATES_DIR: &str = "templates";

/// Errors produced when validating a template identifier.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("template identifier is empty")]
    Empty,

    #[error("template identifier '{0}' may only contain a-z, 0-9 and '-'")]
    InvalidCharacters(String),
}

/// A sanitized template identifier.
///
/// # Example
///
/// ```rust
/// use sitesync_core::template::TemplateDescriptor;
///
/// let id = TemplateDescriptor::parse("acme-dark").unwrap();
/// assert_eq!(id.override_location(), "templates/acme-dark.json");
/// assert!(TemplateDescriptor::parse("../etc/passwd").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TemplateDescriptor(String);

impl TemplateDescriptor {
    /// Validates `raw` against `[a-z0-9-]+`.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError`] when `raw` is empty or contains any other
    /// character.  No trimming or case folding is applied.
    pub fn parse(raw: &str) -> Result<Self, TemplateError> {
        if raw.is_empty() {
            return Err(TemplateError::Empty);
        }
        let valid = raw
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-');
        if !valid {
            return Err(TemplateError::InvalidCharacters(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    /// The built-in template, which uses the base document unchanged.
    pub fn builtin() -> Self {
        Self(BUILTIN_TEMPLATE_ID.to_string())
    }

    pub fn is_builtin(&self) -> bool {
        self.0 == BUILTIN_TEMPLATE_ID
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Relative location of the override document, e.g. `templates/acme.json`.
    pub fn override_location(&self) -> String {
        format!("{TEMPLATES_DIR}/{}.json", self.0)
    }
}

impl fmt::Display for TemplateDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TemplateDescriptor {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TemplateDescriptor {
    type Error = TemplateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TemplateDescriptor> for String {
    fn from(id: TemplateDescriptor) -> Self {
        id.0
    }
}

/// Where a resolved descriptor came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateSource {
    RequestParameter,
    PersistedPreference,
    EnvironmentDefault,
    Builtin,
}

/// The raw, unsanitized candidates available at page load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateCandidates {
    pub request_parameter: Option<String>,
    pub persisted_preference: Option<String>,
    pub environment_default: Option<String>,
}

/// Picks the template for this page load.
///
/// Returns the first candidate that passes sanitization, with its source.
/// Falls back to [`TemplateDescriptor::builtin`] when none does.
pub fn resolve_descriptor(candidates: &TemplateCandidates) -> (TemplateDescriptor, TemplateSource) {
    let ordered = [
        (&candidates.request_parameter, TemplateSource::RequestParameter),
        (&candidates.persisted_preference, TemplateSource::PersistedPreference),
        (&candidates.environment_default, TemplateSource::EnvironmentDefault),
    ];

    for (candidate, source) in ordered {
        let Some(raw) = candidate.as_deref() else {
            continue;
        };
        match TemplateDescriptor::parse(raw) {
            Ok(id) => return (id, source),
            Err(e) => warn!(?source, "ignoring template candidate: {e}"),
        }
    }

    (TemplateDescriptor::builtin(), TemplateSource::Builtin)
}
