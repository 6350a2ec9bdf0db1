//! Persisted user settings: server credentials and the selected entity.
//!
//! Stored as a small TOML file next to the daemon configuration. A missing
//! file is the same as empty settings.

use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_entity_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_entity_name: Option<String>,
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

impl Settings {
    /// URL and token are both present.
    pub fn is_configured(&self) -> bool {
        self.credentials().is_some()
    }

    pub fn has_selected_entity(&self) -> bool {
        self.selected_entity().is_some()
    }

    pub fn credentials(&self) -> Option<(&str, &str)> {
        Some((present(&self.remote_url)?, present(&self.token)?))
    }

    pub fn selected_entity(&self) -> Option<&str> {
        present(&self.selected_entity_id)
    }

    pub fn set_credentials(&mut self, url: impl Into<String>, token: impl Into<String>) {
        self.remote_url = Some(url.into());
        self.token = Some(token.into());
    }

    pub fn select_entity(&mut self, entity_id: impl Into<String>, name: impl Into<String>) {
        self.selected_entity_id = Some(entity_id.into());
        self.selected_entity_name = Some(name.into());
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("Failed to access settings file {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// File-backed settings store.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Settings, SettingsError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No settings at {}, starting empty", self.path.display());
                return Ok(Settings::default());
            }
            Err(e) => return Err(SettingsError::Io(self.path.clone(), e)),
        };
        Ok(toml::from_str(&contents)?)
    }

    pub fn save(&self, settings: &Settings) -> Result<(), SettingsError> {
        let contents = toml::to_string(settings)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| SettingsError::Io(parent.to_path_buf(), e))?;
        }
        std::fs::write(&self.path, contents).map_err(|e| SettingsError::Io(self.path.clone(), e))
    }

    /// Remove every stored value.
    pub fn clear(&self) -> Result<(), SettingsError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SettingsError::Io(self.path.clone(), e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_configured_requires_url_and_token() {
        let mut settings = Settings::default();
        assert!(!settings.is_configured());

        settings.remote_url = Some("http://ha.local:8123".to_string());
        assert!(!settings.is_configured());

        settings.token = Some("  ".to_string());
        assert!(!settings.is_configured());

        settings.token = Some("abc".to_string());
        assert!(settings.is_configured());
        assert_eq!(settings.credentials(), Some(("http://ha.local:8123", "abc")));
        assert!(!settings.has_selected_entity());
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        let store = SettingsStore::new(temp_dir.path().join("settings.toml"));
        assert_eq!(store.load().unwrap(), Settings::default());
    }

    #[test]
    fn test_save_load_clear() {
        let temp_dir = TempDir::new().unwrap();
        let store = SettingsStore::new(temp_dir.path().join("nested/settings.toml"));

        let mut settings = Settings::default();
        settings.set_credentials("http://ha.local:8123", "abc");
        settings.select_entity("light.kitchen", "Kitchen");
        store.save(&settings).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded, settings);
        assert_eq!(loaded.selected_entity(), Some("light.kitchen"));

        store.clear().unwrap();
        assert_eq!(store.load().unwrap(), Settings::default());
        // Clearing twice is fine
        store.clear().unwrap();
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("settings.toml");
        std::fs::write(&path, "remote_url = [").unwrap();
        assert!(matches!(
            SettingsStore::new(path).load(),
            Err(SettingsError::Parse(_))
        ));
    }
}
