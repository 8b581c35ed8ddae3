//! Persisted template preference stored as TOML.
//!
//! The file lives in the platform configuration directory:
//!
//! | Platform | Path                                                     |
//! |----------|----------------------------------------------------------|
//! | Linux    | `$XDG_CONFIG_HOME/sitesync/preferences.toml` (or `~/.config/…`) |
//! | macOS    | `~/Library/Application Support/Sitesync/preferences.toml` |
//! | Windows  | `%APPDATA%\Sitesync\preferences.toml`                    |
//!
//! ```toml
//! template = "acme-dark"
//! ```
//!
//! A missing file means "no preference".

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use sitesync_core::TemplateDescriptor;

use crate::application::resolver::{PreferenceError, PreferenceStore};

const PREFERENCES_FILE: &str = "preferences.toml";

/// On-disk shape of the preferences file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
}

/// [`PreferenceStore`] backed by a TOML file.
#[derive(Debug, Clone)]
pub struct TomlPreferenceStore {
    path: Option<PathBuf>,
}

impl TomlPreferenceStore {
    /// Uses the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// Uses `preferences.toml` in the platform config directory.  When the
    /// platform has no such directory every operation reports
    /// [`PreferenceError::Unavailable`].
    pub fn platform_default() -> Self {
        Self {
            path: platform_config_dir().map(|dir| dir.join(PREFERENCES_FILE)),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn require_path(&self) -> Result<&Path, PreferenceError> {
        self.path.as_deref().ok_or(PreferenceError::Unavailable)
    }

    fn read(&self) -> Result<Preferences, PreferenceError> {
        let path = self.require_path()?;
        match std::fs::read_to_string(path) {
            Ok(content) => {
                toml::from_str(&content).map_err(|e| PreferenceError::Format(e.to_string()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Preferences::default()),
            Err(e) => Err(PreferenceError::Io(format!("{}: {e}", path.display()))),
        }
    }

    fn write(&self, prefs: &Preferences) -> Result<(), PreferenceError> {
        let path = self.require_path()?;
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .map_err(|e| PreferenceError::Io(format!("{}: {e}", dir.display())))?;
        }
        let content =
            toml::to_string_pretty(prefs).map_err(|e| PreferenceError::Format(e.to_string()))?;
        std::fs::write(path, content)
            .map_err(|e| PreferenceError::Io(format!("{}: {e}", path.display())))
    }
}

impl PreferenceStore for TomlPreferenceStore {
    fn load_template(&self) -> Result<Option<String>, PreferenceError> {
        Ok(self.read()?.template)
    }

    fn save_template(&self, template: &TemplateDescriptor) -> Result<(), PreferenceError> {
        let mut prefs = self.read().unwrap_or_default();
        prefs.template = Some(template.as_str().to_string());
        self.write(&prefs)?;
        debug!("persisted template preference '{template}'");
        Ok(())
    }
}

/// Returns the platform-specific directory for sitesync configuration.
pub fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("Sitesync"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("sitesync"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("Sitesync")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_file() -> PathBuf {
        std::env::temp_dir()
            .join(format!("sitesync-prefs-{}", uuid::Uuid::new_v4()))
            .join(PREFERENCES_FILE)
    }

    #[test]
    fn test_missing_file_means_no_preference() {
        let store = TomlPreferenceStore::new(scratch_file());
        assert_eq!(store.load_template().unwrap(), None);
    }

    #[test]
    fn test_save_then_load_round_trip() {
        // Arrange
        let path = scratch_file();
        let store = TomlPreferenceStore::new(&path);
        let template = TemplateDescriptor::parse("acme-dark").unwrap();

        // Act
        store.save_template(&template).unwrap();

        // Assert
        assert_eq!(store.load_template().unwrap().as_deref(), Some("acme-dark"));
        let on_disk = std::fs::read_to_string(&path).unwrap();
        assert!(on_disk.contains("template = \"acme-dark\""));
        if let Some(dir) = path.parent() {
            std::fs::remove_dir_all(dir).ok();
        }
    }

    #[test]
    fn test_malformed_file_is_format_error() {
        let path = scratch_file();
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).unwrap();
        }
        std::fs::write(&path, "template = [").unwrap();

        let err = TomlPreferenceStore::new(&path).load_template().unwrap_err();

        assert!(matches!(err, PreferenceError::Format(_)));
        if let Some(dir) = path.parent() {
            std::fs::remove_dir_all(dir).ok();
        }
    }

    #[test]
    fn test_no_platform_dir_is_unavailable() {
        let store = TomlPreferenceStore { path: None };
        assert!(matches!(
            store.load_template(),
            Err(PreferenceError::Unavailable)
        ));
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn test_platform_config_dir_ends_with_sitesync() {
        if let Some(dir) = platform_config_dir() {
            assert!(dir.ends_with("sitesync"));
        }
    }
}
