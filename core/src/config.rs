//! YAML configuration for an [`OpenHelper`].
//!
//! ```yaml
//! name: champions.db        # omit for in-memory, "" for a temporary file
//! version: 2
//! storage_root: data        # relative roots resolve against the file's directory
//! migrations:
//!   create:
//!     - CREATE TABLE champions (id INTEGER PRIMARY KEY, name TEXT NOT NULL, level INTEGER)
//!   upgrades:
//!     2:
//!       - ALTER TABLE champions ADD COLUMN level INTEGER
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::connection::{ConnectionFactory, DatabaseLocation};
use crate::error::Result;
use crate::helper::OpenHelper;
use crate::migration::MigrationScript;

/// Database name, target version, storage root, and migrations for one helper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelperConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub version: u32,
    #[serde(default = "default_storage_root")]
    pub storage_root: PathBuf,
    #[serde(default)]
    pub migrations: MigrationScript,
}

fn default_storage_root() -> PathBuf {
    PathBuf::from(".")
}

impl HelperConfig {
    pub fn new(name: Option<String>, version: u32) -> Self {
        Self {
            name,
            version,
            storage_root: default_storage_root(),
            migrations: MigrationScript::default(),
        }
    }

    /// Reads a configuration file. A relative `storage_root` is resolved
    /// against the directory holding the file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let mut config: Self = serde_yaml::from_str(&text)?;
        if config.storage_root.is_relative() {
            let base = path.parent().unwrap_or_else(|| Path::new("."));
            config.storage_root = base.join(&config.storage_root);
        }
        debug!(path = %path.display(), version = config.version, "Loaded helper config");
        Ok(config)
    }

    /// Writes the configuration as YAML, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_yaml::to_string(self)?)?;
        Ok(())
    }

    pub fn location(&self) -> Result<DatabaseLocation> {
        DatabaseLocation::resolve(self.name.as_deref(), &self.storage_root)
    }
}

impl<F: ConnectionFactory> OpenHelper<F, MigrationScript> {
    /// Builds a helper whose hooks run the configured migration script.
    pub fn from_config(factory: F, config: &HelperConfig) -> Result<Self> {
        Ok(Self::with_location(
            factory,
            config.migrations.clone(),
            config.location()?,
            config.version,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_minimal_config_defaults() {
        let config: HelperConfig = serde_yaml::from_str("version: 1\n").unwrap();
        assert_eq!(config, HelperConfig::new(None, 1));
        assert_eq!(config.location().unwrap(), DatabaseLocation::InMemory);
    }

    #[test]
    fn test_empty_name_is_temporary() {
        let config: HelperConfig = serde_yaml::from_str("name: \"\"\nversion: 1\n").unwrap();
        assert_eq!(config.location().unwrap(), DatabaseLocation::Temporary);
    }

    #[test]
    fn test_load_resolves_root_against_config_dir() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sqlhelper.yml");
        fs::write(&path, "name: app.db\nversion: 2\nstorage_root: data\n").unwrap();

        let config = HelperConfig::load(&path).unwrap();
        assert_eq!(config.storage_root, dir.path().join("data"));
        assert_eq!(
            config.location().unwrap().path(),
            Some(dir.path().join("data").join("app.db").as_path())
        );
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("sqlhelper.yml");
        let mut config = HelperConfig::new(Some("app.db".to_string()), 3);
        config.storage_root = dir.path().to_path_buf();
        config.migrations.create = vec!["CREATE TABLE t (id INTEGER)".to_string()];
        config.save(&path).unwrap();

        assert_eq!(HelperConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = HelperConfig::load(dir.path().join("missing.yml")).unwrap_err();
        assert!(matches!(err, crate::DatabaseError::ConfigIo(_)));
    }

    #[test]
    fn test_load_invalid_yaml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.yml");
        fs::write(&path, "version: [not, a, number]\n").unwrap();
        let err = HelperConfig::load(&path).unwrap_err();
        assert!(matches!(err, crate::DatabaseError::ConfigYaml(_)));
    }
}
