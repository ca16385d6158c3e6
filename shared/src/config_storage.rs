//! Configuration storage for mission settings.
//!
//! Settings are kept as pretty-printed JSON documents under a root directory
//! (`~/.lander_config/` by default), one file per document name.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid config document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config name '{0}'")]
    InvalidName(String),
}

/// Save any serializable value as JSON
pub fn save_json<T: Serialize>(value: &T, path: &Path) -> Result<(), ConfigError> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json)?;
    Ok(())
}

/// Load a JSON document into `T`
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let json = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}

/// Configuration storage manager.
#[derive(Debug, Clone)]
pub struct ConfigStorage {
    /// Root directory for all configuration (e.g., ~/.lander_config)
    root_path: PathBuf,
}

impl ConfigStorage {
    /// Create a new config storage with default path (~/.lander_config)
    pub fn new() -> std::io::Result<Self> {
        let home = std::env::var("HOME")
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::NotFound, "HOME not set"))?;
        let root_path = PathBuf::from(home).join(".lander_config");
        Ok(Self { root_path })
    }

    /// Create a new config storage with custom root path
    pub fn with_path(root_path: PathBuf) -> Self {
        Self { root_path }
    }

    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    fn document_path(&self, name: &str) -> Result<PathBuf, ConfigError> {
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(ConfigError::InvalidName(name.to_string()));
        }
        Ok(self.root_path.join(format!("{name}.json")))
    }

    /// Load the named document.
    ///
    /// Returns None if no document exists.
    /// Returns Some(Err) if the file exists but cannot be loaded.
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Option<Result<T, ConfigError>> {
        let path = match self.document_path(name) {
            Ok(path) => path,
            Err(e) => return Some(Err(e)),
        };

        if !path.exists() {
            return None;
        }

        Some(load_json(&path))
    }

    /// Load the named document, falling back to `T::default()` if it is missing.
    pub fn get_or_default<T: DeserializeOwned + Default>(&self, name: &str) -> Result<T, ConfigError> {
        self.get(name).unwrap_or_else(|| Ok(T::default()))
    }

    /// Save a document, creating the root directory if needed.
    ///
    /// Returns the path where the document was saved.
    pub fn save<T: Serialize>(&self, name: &str, value: &T) -> Result<PathBuf, ConfigError> {
        let path = self.document_path(name)?;
        std::fs::create_dir_all(&self.root_path)?;
        save_json(value, &path)?;
        Ok(path)
    }

    /// Delete a document.
    ///
    /// Returns Ok(true) if the file was deleted, Ok(false) if it didn't exist.
    pub fn delete(&self, name: &str) -> Result<bool, ConfigError> {
        let path = self.document_path(name)?;

        if !path.exists() {
            return Ok(false);
        }

        std::fs::remove_file(path)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Settings {
        period: f64,
        enabled: bool,
    }

    #[test]
    fn test_missing_document() {
        let temp = TempDir::new().unwrap();
        let storage = ConfigStorage::with_path(temp.path().to_path_buf());
        assert!(storage.get::<Settings>("mission").is_none());
        assert_eq!(
            storage.get_or_default::<Settings>("mission").unwrap(),
            Settings::default()
        );
    }

    #[test]
    fn test_save_load_delete() {
        let temp = TempDir::new().unwrap();
        let storage = ConfigStorage::with_path(temp.path().join("nested"));
        let settings = Settings {
            period: 2.5,
            enabled: true,
        };

        let path = storage.save("mission", &settings).unwrap();
        assert!(path.exists());

        let loaded: Settings = storage.get("mission").unwrap().unwrap();
        assert_eq!(loaded, settings);

        assert!(storage.delete("mission").unwrap());
        assert!(!storage.delete("mission").unwrap());
    }

    #[test]
    fn test_corrupt_document() {
        let temp = TempDir::new().unwrap();
        let storage = ConfigStorage::with_path(temp.path().to_path_buf());
        std::fs::write(temp.path().join("mission.json"), "{ not json").unwrap();
        assert!(matches!(
            storage.get::<Settings>("mission"),
            Some(Err(ConfigError::Parse(_)))
        ));
    }

    #[test]
    fn test_rejects_path_names() {
        let temp = TempDir::new().unwrap();
        let storage = ConfigStorage::with_path(temp.path().to_path_buf());
        assert!(matches!(
            storage.save("../escape", &Settings::default()),
            Err(ConfigError::InvalidName(_))
        ));
    }
}
